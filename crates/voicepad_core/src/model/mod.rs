//! Document model for a live dictation transcript.
//!
//! # Responsibility
//! - Define the in-memory ordered tree of blocks and spans.
//! - Define the persisted record shape shared with storage.
//!
//! # Invariants
//! - Span and block ids are unique within a document for its lifetime.
//! - At most one span is partial, and it is the last span of the last block.

pub mod document;
pub mod record;
