//! Mutation reconciler.
//!
//! # Responsibility
//! - Apply one batch of adapter change records to the document model.
//! - Emit the matching content operations for persistence, in
//!   classification order.
//!
//! # Invariants
//! - Structurally empty insertions never reach the model or the store.
//! - Within a batch, every model mutation happens before any persistence
//!   call is issued by the caller.

use crate::model::document::{BlockKind, ConsistencyError, Document, ModelResult};
use crate::model::record::{ContentKind, ContentRecord};
use crate::tree::{ChangeKind, ChangeRecord, PLACEHOLDER};
use log::debug;

/// Persistence-level effect of one applied change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOpKind {
    Insert,
    Update,
    Delete,
}

/// One model-level instruction destined for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentOp {
    pub kind: ContentOpKind,
    pub record: ContentRecord,
}

/// Applies a drained adapter batch to the document.
///
/// Returns one content operation per applied change, in the order the
/// records were classified. Empty insertions are skipped silently;
/// everything else failing means a logic bug upstream and surfaces as a
/// [`ConsistencyError`].
pub fn reconcile(
    document: &mut Document,
    changes: Vec<ChangeRecord>,
) -> ModelResult<Vec<ContentOp>> {
    let mut ops = Vec::new();
    for change in changes {
        match change.kind {
            ChangeKind::Insertion => {
                if let Some(op) = apply_insertion(document, &change)? {
                    ops.push(op);
                }
            }
            ChangeKind::CharacterUpdate => {
                if let Some(op) = apply_update(document, &change)? {
                    ops.push(op);
                }
            }
            ChangeKind::Deletion => {
                if let Some(op) = apply_deletion(document, &change)? {
                    ops.push(op);
                }
            }
        }
    }
    debug!(
        "event=reconcile module=reconcile status=ok ops={}",
        ops.len()
    );
    Ok(ops)
}

fn apply_insertion(document: &mut Document, change: &ChangeRecord) -> ModelResult<Option<ContentOp>> {
    match change.content_type {
        ContentKind::Text => {
            if is_structurally_empty(&change.content) {
                // NoOp condition: the adapter's cleanup rule.
                return Ok(None);
            }
            let block_id = match document.blocks().last() {
                Some(block) if block.kind == BlockKind::Paragraph => block.id,
                _ => document.append_block(BlockKind::Paragraph),
            };
            document.append_span_with_id(change.id, block_id, change.content.clone(), false)?;
        }
        ContentKind::Headline => {
            document.append_block_with_id(change.id, BlockKind::Headline)?;
            document.append_span(change.id, change.content.clone(), false)?;
        }
        ContentKind::Linebreak => {
            document.append_block_with_id(change.id, BlockKind::Linebreak)?;
        }
    }
    Ok(record_op(document, change, ContentOpKind::Insert))
}

fn apply_update(document: &mut Document, change: &ChangeRecord) -> ModelResult<Option<ContentOp>> {
    match change.content_type {
        ContentKind::Headline => {
            let block = document
                .block(change.id)
                .ok_or(ConsistencyError::UnknownBlock(change.id))?;
            // Headline edits arrive as whole-block text; collapse onto the
            // first span and drop any extras.
            let first = block.spans.first().map(|span| span.id);
            let extras: Vec<_> = block.spans.iter().skip(1).map(|span| span.id).collect();
            match first {
                Some(span_id) => {
                    document.update_span_text(span_id, change.content.clone())?;
                    for extra in extras {
                        document.remove_span(extra)?;
                    }
                }
                None => {
                    document.append_span(change.id, change.content.clone(), false)?;
                }
            }
        }
        _ => {
            document.update_span_text(change.id, change.content.clone())?;
        }
    }
    Ok(record_op(document, change, ContentOpKind::Update))
}

fn apply_deletion(document: &mut Document, change: &ChangeRecord) -> ModelResult<Option<ContentOp>> {
    if document.span(change.id).is_some() {
        let op = record_op(document, change, ContentOpKind::Delete);
        document.remove_span(change.id)?;
        return Ok(op);
    }
    if let Some(block) = document.block(change.id) {
        // Paragraph blocks persist through their spans only, so deleting
        // one produces no store operation of its own.
        let op = match block.kind {
            BlockKind::Paragraph => None,
            _ => record_op(document, change, ContentOpKind::Delete),
        };
        document.remove_block(change.id)?;
        return Ok(op);
    }
    // Deleting a node the model never materialized is a no-op.
    debug!(
        "event=reconcile module=reconcile status=ok skipped_unknown_delete={}",
        change.id
    );
    Ok(None)
}

fn record_op(document: &Document, change: &ChangeRecord, kind: ContentOpKind) -> Option<ContentOp> {
    document
        .record_for(change.id)
        .map(|record| ContentOp { kind, record })
}

fn is_structurally_empty(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.is_empty() || trimmed == PLACEHOLDER
}
