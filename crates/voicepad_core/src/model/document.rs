//! In-memory transcript document.
//!
//! # Responsibility
//! - Own the ordered block/span tree for one open transcript.
//! - Enforce the trailing-partial invariant on every mutation.
//! - Serialize to and load from persisted content records.
//!
//! # Invariants
//! - All span and block ids are unique for the document lifetime.
//! - At most one span has `partial = true`, and it is the last span of the
//!   last block.
//! - Split operations keep the original id on the left-hand entity and mint
//!   a fresh id for the right-hand one.
//! - Order keys are strictly increasing in positional order, so incremental
//!   persistence writes never collide with rows written earlier.
//! - Partial span content never appears in persistence records; a span's
//!   row is written only once it finalizes.

use crate::model::record::{ContentKind, ContentRecord};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a span.
pub type SpanId = Uuid;
/// Stable identifier of a block.
pub type BlockId = Uuid;

/// Spans of one block share an `order_index` bucket of this width, so block
/// grouping survives a serialize/load round trip without a dedicated column.
pub const BLOCK_ORDER_STRIDE: i64 = 1 << 20;

/// Result type for document mutations.
pub type ModelResult<T> = Result<T, ConsistencyError>;

/// Violation of a document-model invariant.
///
/// These indicate a logic bug in the caller (adapter or ingestion) and are
/// never retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    UnknownSpan(SpanId),
    UnknownBlock(BlockId),
    /// An id introduced by the caller already exists in this document.
    DuplicateId(Uuid),
    /// A span was asked to become partial while not being the trailing span.
    PartialNotTrailing(SpanId),
    /// A second partial span was requested while one already exists.
    PartialAlreadyPresent { existing: SpanId, requested: SpanId },
    /// Spans cannot be attached to a linebreak block.
    SpanOnLinebreak(BlockId),
    /// Split offset points past the end of the span text.
    SplitOutOfBounds {
        span: SpanId,
        offset: usize,
        len: usize,
    },
    /// A persisted record could not be interpreted.
    InvalidRecord(String),
}

impl Display for ConsistencyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSpan(id) => write!(f, "unknown span: {id}"),
            Self::UnknownBlock(id) => write!(f, "unknown block: {id}"),
            Self::DuplicateId(id) => write!(f, "duplicate id: {id}"),
            Self::PartialNotTrailing(id) => {
                write!(f, "span {id} cannot be partial: not the trailing span")
            }
            Self::PartialAlreadyPresent {
                existing,
                requested,
            } => write!(
                f,
                "span {requested} cannot be partial: {existing} already is"
            ),
            Self::SpanOnLinebreak(id) => write!(f, "linebreak block {id} cannot own spans"),
            Self::SplitOutOfBounds { span, offset, len } => {
                write!(f, "split offset {offset} past end of span {span} (len {len})")
            }
            Self::InvalidRecord(message) => write!(f, "invalid content record: {message}"),
        }
    }
}

impl Error for ConsistencyError {}

/// Structural category of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Headline,
    Linebreak,
}

/// A run of text with a stable identity and a live-revision flag.
#[derive(Debug, Clone)]
pub struct Span {
    pub id: SpanId,
    pub text: String,
    /// True while the live stream is still revising this span.
    pub partial: bool,
    order_key: i64,
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.text == other.text && self.partial == other.partial
    }
}
impl Eq for Span {}

/// One structural unit of the document.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    /// Empty for `BlockKind::Linebreak`.
    pub spans: Vec<Span>,
    order_key: i64,
    next_span_key: i64,
}

impl Block {
    /// Concatenated text of all owned spans.
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind && self.spans == other.spans
    }
}
impl Eq for Block {}

/// Ordered tree of blocks for one transcript; the single source of truth
/// for content and order.
#[derive(Debug, Clone)]
pub struct Document {
    transcript_id: i64,
    blocks: Vec<Block>,
    next_block_key: i64,
}

impl Document {
    /// Creates an empty document for an externally supplied transcript id.
    pub fn new(transcript_id: i64) -> Self {
        Self {
            transcript_id,
            blocks: Vec::new(),
            next_block_key: 0,
        }
    }

    pub fn transcript_id(&self) -> i64 {
        self.transcript_id
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Appends a new empty block and returns its generated id.
    pub fn append_block(&mut self, kind: BlockKind) -> BlockId {
        let id = Uuid::new_v4();
        self.push_block(id, kind);
        id
    }

    /// Appends a block under a caller-provided id.
    ///
    /// Used when the editable tree minted the identity first.
    pub fn append_block_with_id(&mut self, id: BlockId, kind: BlockKind) -> ModelResult<BlockId> {
        if self.contains_id(id) {
            return Err(ConsistencyError::DuplicateId(id));
        }
        self.push_block(id, kind);
        Ok(id)
    }

    /// Appends a span to the end of a block and returns its generated id.
    pub fn append_span(
        &mut self,
        block_id: BlockId,
        text: impl Into<String>,
        partial: bool,
    ) -> ModelResult<SpanId> {
        self.append_span_with_id(Uuid::new_v4(), block_id, text, partial)
    }

    /// Appends a span under a caller-provided id.
    pub fn append_span_with_id(
        &mut self,
        id: SpanId,
        block_id: BlockId,
        text: impl Into<String>,
        partial: bool,
    ) -> ModelResult<SpanId> {
        if self.contains_id(id) {
            return Err(ConsistencyError::DuplicateId(id));
        }
        if partial {
            if let Some(existing) = self.trailing_partial() {
                return Err(ConsistencyError::PartialAlreadyPresent {
                    existing,
                    requested: id,
                });
            }
            // A partial span is only legal at the trailing edge.
            match self.blocks.last() {
                Some(last) if last.id == block_id => {}
                _ => return Err(ConsistencyError::PartialNotTrailing(id)),
            }
        }

        let block = self
            .blocks
            .iter_mut()
            .find(|block| block.id == block_id)
            .ok_or(ConsistencyError::UnknownBlock(block_id))?;
        if block.kind == BlockKind::Linebreak {
            return Err(ConsistencyError::SpanOnLinebreak(block_id));
        }

        let order_key = block.next_span_key;
        block.next_span_key += 1;
        block.spans.push(Span {
            id,
            text: text.into(),
            partial,
            order_key,
        });
        Ok(id)
    }

    /// Splits a span at a character offset.
    ///
    /// The left span keeps the original id and the text before the offset;
    /// the right span gets a fresh id and the remainder (empty when the
    /// offset sits at the end). A partial flag moves to the right span so
    /// the trailing-edge invariant keeps holding.
    pub fn split_span_at(&mut self, span_id: SpanId, offset: usize) -> ModelResult<(SpanId, SpanId)> {
        let (block_idx, span_idx) = self.locate_span(span_id)?;
        let span = &mut self.blocks[block_idx].spans[span_idx];

        let len = span.text.chars().count();
        if offset > len {
            return Err(ConsistencyError::SplitOutOfBounds {
                span: span_id,
                offset,
                len,
            });
        }
        let byte_offset = span
            .text
            .char_indices()
            .nth(offset)
            .map_or(span.text.len(), |(idx, _)| idx);

        let right_text = span.text.split_off(byte_offset);
        let right_partial = span.partial;
        span.partial = false;

        let right_id = Uuid::new_v4();
        self.blocks[block_idx].spans.insert(
            span_idx + 1,
            Span {
                id: right_id,
                text: right_text,
                partial: right_partial,
                order_key: 0,
            },
        );
        // The insertion lands between existing keys; renumber the block so
        // key order matches positional order again.
        self.rebase_span_keys(block_idx);
        Ok((span_id, right_id))
    }

    /// Splits a block at a character offset inside one of its spans.
    ///
    /// The split span's right half and every following span move into a new
    /// block of the same kind inserted directly after. The left block keeps
    /// the original id.
    pub fn split_block_at(
        &mut self,
        block_id: BlockId,
        span_id: SpanId,
        offset: usize,
    ) -> ModelResult<(BlockId, BlockId)> {
        let (block_idx, _) = self.locate_span(span_id)?;
        if self.blocks[block_idx].id != block_id {
            return Err(ConsistencyError::UnknownBlock(block_id));
        }

        let (_, right_span) = self.split_span_at(span_id, offset)?;
        let (_, right_idx) = self.locate_span(right_span)?;

        let kind = self.blocks[block_idx].kind;
        let moved: Vec<Span> = self.blocks[block_idx].spans.split_off(right_idx);
        let right_id = Uuid::new_v4();
        self.blocks.insert(
            block_idx + 1,
            Block {
                id: right_id,
                kind,
                spans: moved,
                order_key: 0,
                next_span_key: 0,
            },
        );
        self.rebase_block_keys();
        self.rebase_span_keys(block_idx + 1);
        Ok((block_id, right_id))
    }

    /// Replaces the full text of a span.
    pub fn update_span_text(&mut self, span_id: SpanId, text: impl Into<String>) -> ModelResult<()> {
        let (block_idx, span_idx) = self.locate_span(span_id)?;
        self.blocks[block_idx].spans[span_idx].text = text.into();
        Ok(())
    }

    /// Sets or clears the partial flag of a span.
    pub fn set_span_partial(&mut self, span_id: SpanId, partial: bool) -> ModelResult<()> {
        if partial {
            if let Some(existing) = self.trailing_partial() {
                if existing != span_id {
                    return Err(ConsistencyError::PartialAlreadyPresent {
                        existing,
                        requested: span_id,
                    });
                }
            }
            match self.last_span() {
                Some(span) if span.id == span_id => {}
                _ => return Err(ConsistencyError::PartialNotTrailing(span_id)),
            }
        }
        let (block_idx, span_idx) = self.locate_span(span_id)?;
        self.blocks[block_idx].spans[span_idx].partial = partial;
        Ok(())
    }

    /// Removes a span. The owning block stays, even when emptied; the tree
    /// adapter synthesizes a block deletion in that case.
    pub fn remove_span(&mut self, span_id: SpanId) -> ModelResult<()> {
        let (block_idx, span_idx) = self.locate_span(span_id)?;
        self.blocks[block_idx].spans.remove(span_idx);
        Ok(())
    }

    /// Removes a block and every span it owns.
    pub fn remove_block(&mut self, block_id: BlockId) -> ModelResult<()> {
        let idx = self
            .blocks
            .iter()
            .position(|block| block.id == block_id)
            .ok_or(ConsistencyError::UnknownBlock(block_id))?;
        self.blocks.remove(idx);
        Ok(())
    }

    /// Returns the span owning the given id, if any.
    pub fn span(&self, span_id: SpanId) -> Option<&Span> {
        self.blocks
            .iter()
            .flat_map(|block| block.spans.iter())
            .find(|span| span.id == span_id)
    }

    /// Returns the block owning the given id, if any.
    pub fn block(&self, block_id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == block_id)
    }

    /// Returns the block containing the given span, if any.
    pub fn owning_block(&self, span_id: SpanId) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|block| block.spans.iter().any(|span| span.id == span_id))
    }

    /// Returns the last span of the trailing block.
    pub fn last_span(&self) -> Option<&Span> {
        self.blocks.last().and_then(|block| block.spans.last())
    }

    /// Returns the id of the document's single partial span, if present.
    pub fn trailing_partial(&self) -> Option<SpanId> {
        self.last_span().filter(|span| span.partial).map(|span| span.id)
    }

    /// Builds the persisted record for one span or structural block.
    ///
    /// Returns `None` when the id does not exist, refers to a paragraph
    /// block (paragraphs persist through their spans only), or refers to a
    /// still-partial span (its row is written on finalization).
    pub fn record_for(&self, id: Uuid) -> Option<ContentRecord> {
        for block in &self.blocks {
            let base = block.order_key * BLOCK_ORDER_STRIDE;
            match block.kind {
                BlockKind::Paragraph => {
                    for span in &block.spans {
                        if span.id == id {
                            if span.partial {
                                return None;
                            }
                            return Some(self.record(
                                span.id,
                                span.text.clone(),
                                ContentKind::Text,
                                base + span.order_key,
                            ));
                        }
                    }
                }
                BlockKind::Headline => {
                    if block.id == id {
                        return Some(self.record(
                            block.id,
                            block.text(),
                            ContentKind::Headline,
                            base,
                        ));
                    }
                }
                BlockKind::Linebreak => {
                    if block.id == id {
                        return Some(self.record(
                            block.id,
                            "\n".to_string(),
                            ContentKind::Linebreak,
                            base,
                        ));
                    }
                }
            }
        }
        None
    }

    /// Serializes the whole document into ordered content records.
    ///
    /// Paragraphs emit one `text` row per finalized span; headline and
    /// linebreak blocks emit a single row under the block id. Each block
    /// occupies one `order_index` stride bucket so `load` can regroup
    /// spans. A still-partial span is skipped entirely, so a full save
    /// during a dictation pause leaves no row its later finalization insert
    /// would collide with.
    pub fn serialize(&self) -> Vec<ContentRecord> {
        let mut records = Vec::new();
        for block in &self.blocks {
            let base = block.order_key * BLOCK_ORDER_STRIDE;
            match block.kind {
                BlockKind::Paragraph => {
                    for span in &block.spans {
                        if span.partial {
                            continue;
                        }
                        records.push(self.record(
                            span.id,
                            span.text.clone(),
                            ContentKind::Text,
                            base + span.order_key,
                        ));
                    }
                }
                BlockKind::Headline => {
                    records.push(self.record(block.id, block.text(), ContentKind::Headline, base));
                }
                BlockKind::Linebreak => {
                    records.push(self.record(
                        block.id,
                        "\n".to_string(),
                        ContentKind::Linebreak,
                        base,
                    ));
                }
            }
        }
        records
    }

    /// Rebuilds a document from persisted records.
    ///
    /// Records are ordered by `order_index`; `text` rows sharing a stride
    /// bucket become spans of one paragraph. All partial flags load as
    /// finalized. Paragraph block ids and headline-internal span ids are
    /// regenerated; persisted row ids stay stable.
    pub fn load(transcript_id: i64, records: &[ContentRecord]) -> ModelResult<Self> {
        let mut ordered: Vec<&ContentRecord> = records.iter().collect();
        ordered.sort_by_key(|record| record.order_index);

        let mut document = Self::new(transcript_id);
        let mut seen = HashSet::new();
        let mut open_bucket: Option<i64> = None;

        for record in ordered {
            let id = Uuid::parse_str(&record.id).map_err(|_| {
                ConsistencyError::InvalidRecord(format!("invalid record id `{}`", record.id))
            })?;
            if !seen.insert(id) {
                return Err(ConsistencyError::DuplicateId(id));
            }

            let bucket = record.order_index.div_euclid(BLOCK_ORDER_STRIDE);
            match record.content_type {
                ContentKind::Text => {
                    let block_id = match (open_bucket, document.blocks.last()) {
                        (Some(open), Some(last)) if open == bucket => last.id,
                        _ => document.append_block(BlockKind::Paragraph),
                    };
                    open_bucket = Some(bucket);
                    document.append_span_with_id(id, block_id, record.content.clone(), false)?;
                }
                ContentKind::Headline => {
                    open_bucket = None;
                    document.append_block_with_id(id, BlockKind::Headline)?;
                    document.append_span(id, record.content.clone(), false)?;
                }
                ContentKind::Linebreak => {
                    open_bucket = None;
                    document.append_block_with_id(id, BlockKind::Linebreak)?;
                }
            }
        }
        Ok(document)
    }

    /// Flattens the document to newline-joined plain text.
    ///
    /// Paragraph and headline blocks each take one line; a linebreak block
    /// produces a blank line.
    pub fn export_text(&self) -> String {
        let lines: Vec<String> = self
            .blocks
            .iter()
            .map(|block| match block.kind {
                BlockKind::Paragraph | BlockKind::Headline => block.text(),
                BlockKind::Linebreak => String::new(),
            })
            .collect();
        lines.join("\n")
    }

    fn push_block(&mut self, id: BlockId, kind: BlockKind) {
        let order_key = self.next_block_key;
        self.next_block_key += 1;
        self.blocks.push(Block {
            id,
            kind,
            spans: Vec::new(),
            order_key,
            next_span_key: 0,
        });
    }

    fn rebase_block_keys(&mut self) {
        for (idx, block) in self.blocks.iter_mut().enumerate() {
            block.order_key = idx as i64;
        }
        self.next_block_key = self.blocks.len() as i64;
    }

    fn rebase_span_keys(&mut self, block_idx: usize) {
        let block = &mut self.blocks[block_idx];
        for (idx, span) in block.spans.iter_mut().enumerate() {
            span.order_key = idx as i64;
        }
        block.next_span_key = block.spans.len() as i64;
    }

    fn record(&self, id: Uuid, content: String, kind: ContentKind, order: i64) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            transcript_id: self.transcript_id,
            content,
            content_type: kind,
            order_index: order,
        }
    }

    fn contains_id(&self, id: Uuid) -> bool {
        self.blocks
            .iter()
            .any(|block| block.id == id || block.spans.iter().any(|span| span.id == id))
    }

    fn locate_span(&self, span_id: SpanId) -> ModelResult<(usize, usize)> {
        for (block_idx, block) in self.blocks.iter().enumerate() {
            if let Some(span_idx) = block.spans.iter().position(|span| span.id == span_id) {
                return Ok((block_idx, span_idx));
            }
        }
        Err(ConsistencyError::UnknownSpan(span_id))
    }
}
