//! Persisted content record shape.
//!
//! # Responsibility
//! - Define the row format shared between the document model and storage.
//!
//! # Invariants
//! - One record per span, headline block, or linebreak block.
//! - `order_index` values are sparse; only relative order is meaningful.

use serde::{Deserialize, Serialize};

/// Persisted category of one content row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// One paragraph span.
    Text,
    /// One headline block.
    Headline,
    /// One linebreak block.
    Linebreak,
}

/// One persisted content row, scoped to a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Stable id of the span or structural block this row mirrors.
    pub id: String,
    /// Owning transcript; rows cascade-delete with it.
    pub transcript_id: i64,
    pub content: String,
    pub content_type: ContentKind,
    /// Sparse ordering key; see `Document::serialize` for the encoding.
    pub order_index: i64,
}
