//! Editable tree adapter.
//!
//! # Responsibility
//! - Render the document model into host-facing block/span nodes.
//! - Capture host edits through an explicit command API and turn them into
//!   change records for the reconciler.
//! - Intercept enter-key splits and map them onto model split operations.
//!
//! # Invariants
//! - Rendered node ids mirror model ids; placeholder spans are the only
//!   nodes without a model counterpart.
//! - `drain_changes` yields at most one record per node, last write wins.
//! - A node emptied within a batch leaves the tree and the batch as one
//!   deletion, never as a stale update.

use crate::model::document::{BlockId, BlockKind, Document, ModelResult, SpanId};
use crate::model::record::ContentKind;
use uuid::Uuid;

/// Zero-width sentinel giving empty nodes a caret target.
pub const PLACEHOLDER: &str = "\u{200B}";

/// Classification of one captured edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insertion,
    CharacterUpdate,
    Deletion,
}

/// Transient description of one edit observed on the editable tree.
///
/// Produced by the adapter, consumed by the reconciler, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub id: Uuid,
    pub content: String,
    pub content_type: ContentKind,
    pub kind: ChangeKind,
}

/// A fragment of span text; `highlighted` marks search matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub highlighted: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: false,
        }
    }
}

/// Host-facing span node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanNode {
    pub id: SpanId,
    pub runs: Vec<TextRun>,
    pub partial: bool,
    /// True until the node carries real content known to the model.
    pub placeholder: bool,
}

impl SpanNode {
    /// Full node text across all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    fn is_structurally_empty(&self) -> bool {
        let text = self.text();
        let trimmed = text.trim();
        trimmed.is_empty() || trimmed == PLACEHOLDER
    }
}

/// Host-facing block node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    pub id: BlockId,
    pub kind: BlockKind,
    pub spans: Vec<SpanNode>,
}

/// Bidirectional bridge between the document model and the host tree.
///
/// Host mutations go through the command methods, which record every change
/// at the call site; there is no after-the-fact diffing.
#[derive(Debug, Default)]
pub struct EditorTree {
    blocks: Vec<BlockNode>,
    pending: Vec<ChangeRecord>,
}

impl EditorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[BlockNode] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [BlockNode] {
        &mut self.blocks
    }

    /// Rebuilds all nodes from the model.
    ///
    /// Empty paragraph and headline blocks receive a generated zero-width
    /// placeholder span so the host always has a caret target. Queued change
    /// records survive a render.
    pub fn render(&mut self, document: &Document) {
        self.blocks = document
            .blocks()
            .iter()
            .map(|block| {
                let mut spans: Vec<SpanNode> = block
                    .spans
                    .iter()
                    .map(|span| SpanNode {
                        id: span.id,
                        runs: vec![TextRun::plain(span.text.clone())],
                        partial: span.partial,
                        placeholder: false,
                    })
                    .collect();
                if spans.is_empty() && block.kind != BlockKind::Linebreak {
                    spans.push(SpanNode {
                        id: Uuid::new_v4(),
                        runs: vec![TextRun::plain(PLACEHOLDER)],
                        partial: false,
                        placeholder: true,
                    });
                }
                BlockNode {
                    id: block.id,
                    kind: block.kind,
                    spans,
                }
            })
            .collect();
    }

    /// Appends a structural block node and records its insertion.
    ///
    /// Used by the host commands for headlines and paragraph separators.
    pub fn insert_block_node(&mut self, kind: BlockKind, text: &str) -> BlockId {
        let id = Uuid::new_v4();
        let (spans, content_type, content) = match kind {
            BlockKind::Headline => (
                vec![SpanNode {
                    id: Uuid::new_v4(),
                    runs: vec![TextRun::plain(text)],
                    partial: false,
                    placeholder: true,
                }],
                ContentKind::Headline,
                text.to_string(),
            ),
            BlockKind::Linebreak => (Vec::new(), ContentKind::Linebreak, "\n".to_string()),
            BlockKind::Paragraph => (
                vec![SpanNode {
                    id: Uuid::new_v4(),
                    runs: vec![TextRun::plain(PLACEHOLDER)],
                    partial: false,
                    placeholder: true,
                }],
                ContentKind::Text,
                String::new(),
            ),
        };
        self.blocks.push(BlockNode { id, kind, spans });
        // Empty paragraphs stay unrecorded; their first text edit inserts
        // them. Structural blocks are recorded right away.
        if kind != BlockKind::Paragraph {
            self.pending.push(ChangeRecord {
                id,
                content,
                content_type,
                kind: ChangeKind::Insertion,
            });
        }
        id
    }

    /// Replaces the full text of a span node and records the edit.
    ///
    /// Placeholder spans materialize into insertions on their first real
    /// content; everything else is a character update. Edits inside a
    /// headline are recorded against the headline block id.
    pub fn set_span_text(&mut self, span_id: SpanId, text: &str) -> ModelResult<()> {
        let (block_idx, span_idx) = self.locate_span(span_id)?;
        let block_id = self.blocks[block_idx].id;
        let block_kind = self.blocks[block_idx].kind;

        let span = &mut self.blocks[block_idx].spans[span_idx];
        span.runs = vec![TextRun::plain(text)];
        let was_placeholder = span.placeholder;
        if !span.is_structurally_empty() {
            span.placeholder = false;
        }

        let record = if block_kind == BlockKind::Headline {
            ChangeRecord {
                id: block_id,
                content: self.blocks[block_idx]
                    .spans
                    .iter()
                    .map(SpanNode::text)
                    .collect(),
                content_type: ContentKind::Headline,
                kind: ChangeKind::CharacterUpdate,
            }
        } else {
            ChangeRecord {
                id: span_id,
                content: text.to_string(),
                content_type: ContentKind::Text,
                kind: if was_placeholder {
                    ChangeKind::Insertion
                } else {
                    ChangeKind::CharacterUpdate
                },
            }
        };
        self.pending.push(record);
        Ok(())
    }

    /// Removes a span or block node and records the deletion.
    pub fn remove_node(&mut self, id: Uuid) -> ModelResult<()> {
        if let Ok((block_idx, span_idx)) = self.locate_span(id) {
            let span = self.blocks[block_idx].spans.remove(span_idx);
            // Nodes the model never learned about vanish silently.
            if !span.placeholder {
                self.pending.push(ChangeRecord {
                    id,
                    content: String::new(),
                    content_type: ContentKind::Text,
                    kind: ChangeKind::Deletion,
                });
            }
            return Ok(());
        }

        let block_idx = self
            .blocks
            .iter()
            .position(|block| block.id == id)
            .ok_or(crate::model::document::ConsistencyError::UnknownBlock(id))?;
        let block = self.blocks.remove(block_idx);
        let content_type = match block.kind {
            BlockKind::Headline => ContentKind::Headline,
            BlockKind::Linebreak => ContentKind::Linebreak,
            BlockKind::Paragraph => ContentKind::Text,
        };
        for span in &block.spans {
            if !span.placeholder {
                self.pending.push(ChangeRecord {
                    id: span.id,
                    content: String::new(),
                    content_type: ContentKind::Text,
                    kind: ChangeKind::Deletion,
                });
            }
        }
        self.pending.push(ChangeRecord {
            id,
            content: String::new(),
            content_type,
            kind: ChangeKind::Deletion,
        });
        Ok(())
    }

    /// Enter-key interception.
    ///
    /// Splits the caret's span and block in the model, re-renders the tree,
    /// and returns the span id the caret should move to. With the caret at
    /// the end of a block's last span this yields a new block holding an
    /// empty placeholder span; mid-text the trailing content moves into the
    /// new right block. The caller persists via a full save afterward.
    pub fn split_at_caret(
        &mut self,
        document: &mut Document,
        span_id: SpanId,
        offset: usize,
    ) -> ModelResult<SpanId> {
        let block_id = document
            .owning_block(span_id)
            .map(|block| block.id)
            .ok_or(crate::model::document::ConsistencyError::UnknownSpan(span_id))?;

        let (_, right_block) = document.split_block_at(block_id, span_id, offset)?;
        let caret = document
            .block(right_block)
            .and_then(|block| block.spans.first())
            .map(|span| span.id)
            .ok_or(crate::model::document::ConsistencyError::UnknownBlock(
                right_block,
            ))?;
        self.render(document);
        Ok(caret)
    }

    /// Drains the batch of queued change records for one reconciliation
    /// tick.
    ///
    /// Records are deduplicated per node (last write wins, first-seen
    /// order), then emptied-node cleanup runs: a touched span or headline
    /// whose trimmed text is empty or equals the placeholder sentinel is
    /// removed from the tree and its record becomes a deletion. Blocks left
    /// without spans are removed and get a synthesized deletion as well.
    pub fn drain_changes(&mut self) -> Vec<ChangeRecord> {
        let raw = std::mem::take(&mut self.pending);

        let mut deduped: Vec<ChangeRecord> = Vec::new();
        for record in raw {
            match deduped.iter().position(|entry| entry.id == record.id) {
                Some(idx) => {
                    if deduped[idx].kind == ChangeKind::Insertion {
                        match record.kind {
                            // An insert overwritten by an edit is still an
                            // insert of the latest content.
                            ChangeKind::CharacterUpdate => deduped[idx].content = record.content,
                            // Inserted and removed within one batch; the
                            // node never materialized anywhere.
                            ChangeKind::Deletion => {
                                deduped.remove(idx);
                            }
                            ChangeKind::Insertion => deduped[idx] = record,
                        }
                    } else {
                        deduped[idx] = record;
                    }
                }
                None => deduped.push(record),
            }
        }

        let mut batch: Vec<ChangeRecord> = Vec::new();
        for mut record in deduped {
            if record.kind == ChangeKind::Deletion {
                batch.push(record);
                continue;
            }
            let emptied = match record.content_type {
                ContentKind::Text => match self.locate_span(record.id) {
                    Ok((block_idx, span_idx)) => {
                        let span = &self.blocks[block_idx].spans[span_idx];
                        if span.is_structurally_empty() {
                            let placeholder = span.placeholder;
                            self.blocks[block_idx].spans.remove(span_idx);
                            if placeholder {
                                // Never materialized; nothing to delete.
                                continue;
                            }
                            true
                        } else {
                            false
                        }
                    }
                    Err(_) => false,
                },
                ContentKind::Headline => {
                    match self.blocks.iter().position(|block| block.id == record.id) {
                        Some(block_idx) => {
                            let text: String = self.blocks[block_idx]
                                .spans
                                .iter()
                                .map(SpanNode::text)
                                .collect();
                            let trimmed = text.trim();
                            if trimmed.is_empty() || trimmed == PLACEHOLDER {
                                self.blocks.remove(block_idx);
                                true
                            } else {
                                false
                            }
                        }
                        None => false,
                    }
                }
                ContentKind::Linebreak => false,
            };
            if emptied {
                if record.kind == ChangeKind::Insertion {
                    // Emptied before the model ever learned about it.
                    continue;
                }
                record.kind = ChangeKind::Deletion;
                record.content.clear();
            }
            batch.push(record);
        }

        // Sweep blocks the batch emptied out entirely.
        let mut idx = 0;
        while idx < self.blocks.len() {
            let block = &self.blocks[idx];
            if block.kind != BlockKind::Linebreak && block.spans.is_empty() {
                let removed = self.blocks.remove(idx);
                if !batch
                    .iter()
                    .any(|entry| entry.id == removed.id && entry.kind == ChangeKind::Deletion)
                {
                    batch.push(ChangeRecord {
                        id: removed.id,
                        content: String::new(),
                        content_type: match removed.kind {
                            BlockKind::Headline => ContentKind::Headline,
                            _ => ContentKind::Text,
                        },
                        kind: ChangeKind::Deletion,
                    });
                }
            } else {
                idx += 1;
            }
        }

        batch
    }

    /// Whether any change records are queued.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn locate_span(&self, span_id: SpanId) -> ModelResult<(usize, usize)> {
        for (block_idx, block) in self.blocks.iter().enumerate() {
            if let Some(span_idx) = block.spans.iter().position(|span| span.id == span_id) {
                return Ok((block_idx, span_idx));
            }
        }
        Err(crate::model::document::ConsistencyError::UnknownSpan(
            span_id,
        ))
    }
}
