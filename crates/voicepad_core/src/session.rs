//! Editor session orchestration.
//!
//! # Responsibility
//! - Own the document, editable tree, mode machine and ingest controller
//!   for one open transcript.
//! - Route host commands through the right layer and persist the results.
//!
//! # Invariants
//! - Reconciliation and caret splits are refused while dictation runs.
//! - Leaving dictation stops ingestion before the mode flips, so no late
//!   segment lands in editing mode.
//! - Every persistence operation runs against the store before the tree is
//!   re-rendered from the model.

use crate::ingest::{IngestController, IngestError, SegmentSource};
use crate::mode::{EditorMode, EditorModeMachine};
use crate::model::document::{BlockKind, ConsistencyError, Document, SpanId};
use crate::reconcile::{reconcile, ContentOp, ContentOpKind};
use crate::repo::content_repo::ContentRepository;
use crate::repo::RepoError;
use crate::search::{self, QueryMode, SearchError};
use crate::tree::EditorTree;
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SessionResult<T> = Result<T, SessionError>;

/// Session-level error; wraps the layer errors and adds mode gating.
#[derive(Debug)]
pub enum SessionError {
    /// The operation is illegal while dictation is active.
    DictationActive,
    Consistency(ConsistencyError),
    Repo(RepoError),
    Search(SearchError),
    Ingest(IngestError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DictationActive => write!(f, "operation not allowed while dictating"),
            Self::Consistency(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
            Self::Ingest(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DictationActive => None,
            Self::Consistency(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::Ingest(err) => Some(err),
        }
    }
}

impl From<ConsistencyError> for SessionError {
    fn from(value: ConsistencyError) -> Self {
        Self::Consistency(value)
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SearchError> for SessionError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

impl From<IngestError> for SessionError {
    fn from(value: IngestError) -> Self {
        Self::Ingest(value)
    }
}

/// One open transcript with its full editing pipeline.
pub struct EditorSession<R: ContentRepository> {
    repo: R,
    document: Document,
    tree: EditorTree,
    modes: EditorModeMachine,
    ingest: IngestController,
}

impl<R: ContentRepository> EditorSession<R> {
    /// Creates a session over an empty document.
    pub fn new(repo: R, transcript_id: i64) -> Self {
        let document = Document::new(transcript_id);
        let mut tree = EditorTree::new();
        tree.render(&document);
        Self {
            repo,
            document,
            tree,
            modes: EditorModeMachine::new(),
            ingest: IngestController::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tree(&self) -> &EditorTree {
        &self.tree
    }

    pub fn mode(&self) -> EditorMode {
        self.modes.mode()
    }

    /// Loads the persisted transcript content into the session.
    pub fn load_contents(&mut self) -> SessionResult<()> {
        let transcript_id = self.document.transcript_id();
        let records = self.repo.load_contents(transcript_id)?;
        self.document = Document::load(transcript_id, &records)?;
        self.tree.render(&self.document);
        info!(
            "event=load_contents module=session status=ok transcript={transcript_id} records={}",
            records.len()
        );
        Ok(())
    }

    /// Host command: insert a paragraph separator at the document end.
    pub fn insert_paragraph(&mut self) {
        self.tree.insert_block_node(BlockKind::Linebreak, "");
    }

    /// Host command: append a headline, framed by paragraph separators.
    pub fn insert_headline(&mut self, title: &str) {
        self.tree.insert_block_node(BlockKind::Linebreak, "");
        self.tree.insert_block_node(BlockKind::Headline, title);
        self.tree.insert_block_node(BlockKind::Linebreak, "");
    }

    /// Host command: replace the text of one span node.
    pub fn edit_span_text(&mut self, span_id: SpanId, text: &str) -> SessionResult<()> {
        self.tree.set_span_text(span_id, text)?;
        Ok(())
    }

    /// Host command: remove a span or block node.
    pub fn delete_node(&mut self, id: Uuid) -> SessionResult<()> {
        self.tree.remove_node(id)?;
        Ok(())
    }

    /// Host command: enter-key split at the caret.
    ///
    /// Mutates the model directly, persists via a full save, and returns
    /// the span id the caret should land on.
    pub fn split_at_caret(&mut self, span_id: SpanId, offset: usize) -> SessionResult<SpanId> {
        if self.modes.is_dictating() {
            return Err(SessionError::DictationActive);
        }
        let caret = self
            .tree
            .split_at_caret(&mut self.document, span_id, offset)?;
        self.save_contents()?;
        Ok(caret)
    }

    /// Applies every queued tree change to the model and the store.
    pub fn reconcile(&mut self) -> SessionResult<()> {
        if self.modes.is_dictating() {
            return Err(SessionError::DictationActive);
        }
        if !self.tree.has_pending() {
            return Ok(());
        }
        let batch = self.tree.drain_changes();
        let ops = match reconcile(&mut self.document, batch) {
            Ok(ops) => ops,
            Err(err) => {
                error!("event=reconcile module=session status=error error={err}");
                return Err(err.into());
            }
        };
        self.apply_ops(&ops)?;
        self.tree.render(&self.document);
        Ok(())
    }

    /// One dictation tick: poll the source and merge its segments.
    ///
    /// A no-op outside dictation mode.
    pub fn tick_dictation<S: SegmentSource>(&mut self, source: &mut S) -> SessionResult<()> {
        if !self.modes.is_dictating() {
            return Ok(());
        }
        let ops = self.ingest.tick(&mut self.document, source)?;
        self.apply_ops(&ops)?;
        self.tree.render(&self.document);
        Ok(())
    }

    /// Enters dictation mode and starts ingestion.
    pub fn start_dictation(&mut self) {
        self.modes.start_dictation();
        self.ingest.start(&self.document);
        info!("event=dictation_start module=session status=ok");
    }

    /// Stops ingestion, then leaves dictation mode.
    ///
    /// Any still-partial trailing span stays partial; the next
    /// `start_dictation` re-attaches to it.
    pub fn stop_dictation(&mut self) {
        self.ingest.stop();
        self.modes.stop_dictation();
        info!("event=dictation_stop module=session status=ok");
    }

    /// Host command: switch to the named editor mode.
    ///
    /// Entering [`EditorMode::Dictating`] starts ingestion; leaving it
    /// stops the controller before the mode flips.
    pub fn set_mode(&mut self, mode: EditorMode) {
        match mode {
            EditorMode::Dictating => {
                if !self.modes.is_dictating() {
                    self.start_dictation();
                }
            }
            EditorMode::Editing | EditorMode::Selection => {
                if self.modes.is_dictating() {
                    self.ingest.stop();
                }
                self.modes.set_mode(mode);
            }
        }
    }

    /// Host notification: the selection changed.
    pub fn selection_changed(&mut self, collapsed: bool) {
        self.modes.selection_changed(collapsed);
    }

    /// Highlights matches of `query` in the tree; returns the match count.
    pub fn search(&mut self, query: &str, mode: QueryMode) -> SessionResult<usize> {
        let matches = search::highlight(&mut self.tree, query, mode)?;
        debug!("event=search module=session status=ok matches={matches}");
        Ok(matches)
    }

    /// Clears all search highlights.
    pub fn clear_search(&mut self) {
        search::clear_highlights(&mut self.tree);
    }

    /// Replaces highlighted matches and writes the new text back through
    /// the model to the store. Span identity is preserved.
    pub fn replace(
        &mut self,
        replacement: &str,
        query: &str,
        mode: QueryMode,
        replace_all: bool,
    ) -> SessionResult<usize> {
        let changed = search::replace(&mut self.tree, replacement, query, mode, replace_all)?;

        let mut ops = Vec::new();
        for span_id in &changed {
            let text = self
                .tree
                .blocks()
                .iter()
                .flat_map(|block| block.spans.iter())
                .find(|span| span.id == *span_id)
                .map(|span| span.text())
                .ok_or(ConsistencyError::UnknownSpan(*span_id))?;
            self.document.update_span_text(*span_id, text)?;

            // Paragraph spans persist under their own id; headline spans
            // persist under the owning block id.
            let record = match self.document.record_for(*span_id) {
                Some(record) => Some(record),
                None => self
                    .document
                    .owning_block(*span_id)
                    .and_then(|block| self.document.record_for(block.id)),
            };
            if let Some(record) = record {
                ops.push(ContentOp {
                    kind: ContentOpKind::Update,
                    record,
                });
            }
        }
        self.apply_ops(&ops)?;
        debug!(
            "event=replace module=session status=ok spans={}",
            changed.len()
        );
        Ok(changed.len())
    }

    /// Flushes the whole document to the store in one transaction.
    pub fn save_contents(&mut self) -> SessionResult<()> {
        let records = self.document.serialize();
        self.repo
            .save_all(self.document.transcript_id(), &records)?;
        info!(
            "event=save_contents module=session status=ok rows={}",
            records.len()
        );
        Ok(())
    }

    /// Flattens the document to plain text for export.
    pub fn export_text(&self) -> String {
        self.document.export_text()
    }

    fn apply_ops(&mut self, ops: &[ContentOp]) -> SessionResult<()> {
        for op in ops {
            match op.kind {
                ContentOpKind::Insert => self.repo.insert_content(&op.record)?,
                ContentOpKind::Update => self.repo.update_content(&op.record)?,
                ContentOpKind::Delete => self.repo.delete_content(&op.record.id)?,
            }
        }
        Ok(())
    }
}
