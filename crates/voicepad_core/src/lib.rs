//! Core document synchronization engine for VoicePad.
//! This crate is the single source of truth for transcript content,
//! ordering, and dictation-merge invariants.

pub mod db;
pub mod ingest;
pub mod logging;
pub mod mode;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod search;
pub mod session;
pub mod tree;

pub use ingest::{IngestController, Segment, SegmentPayload, SegmentSource};
pub use logging::{default_log_level, init_logging};
pub use mode::{EditorMode, EditorModeMachine};
pub use model::document::{Block, BlockId, BlockKind, ConsistencyError, Document, Span, SpanId};
pub use model::record::{ContentKind, ContentRecord};
pub use repo::content_repo::{ContentRepository, SqliteContentRepository};
pub use repo::transcript_repo::{SqliteTranscriptRepository, Transcript, TranscriptRepository};
pub use repo::{RepoError, RepoResult};
pub use search::{QueryMode, SearchError};
pub use session::{EditorSession, SessionError};
pub use tree::{ChangeKind, ChangeRecord, EditorTree};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
