//! Streaming ingestion controller.
//!
//! # Responsibility
//! - Pull segment batches from the recognition source while dictating.
//! - Merge partial/final segments into the document's trailing edge.
//! - Emit persistence operations the moment a span finalizes.
//!
//! # Invariants
//! - Only the last-live span is ever mutated; user content elsewhere is
//!   never touched.
//! - Segments apply strictly in arrival order; duplicates and reordering
//!   are not detected (documented constraint).
//! - After `stop`, the source is not polled and no late segment is applied.
//! - Partial content is never handed to persistence.

use crate::model::document::{BlockKind, ConsistencyError, Document, SpanId};
use crate::reconcile::{ContentOp, ContentOpKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raw segment payload as delivered by the host channel.
///
/// Fields are optional so a malformed payload can be rejected instead of
/// failing deserialization of the whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPayload {
    pub text: Option<String>,
    pub is_partial: Option<bool>,
}

/// A validated transcription segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub is_partial: bool,
}

/// Malformed segment payload; dropped with a logged warning during normal
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentValidationError {
    MissingText,
    MissingPartialFlag,
}

impl Display for SegmentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingText => write!(f, "segment payload has no text field"),
            Self::MissingPartialFlag => write!(f, "segment payload has no isPartial field"),
        }
    }
}

impl Error for SegmentValidationError {}

impl TryFrom<SegmentPayload> for Segment {
    type Error = SegmentValidationError;

    fn try_from(payload: SegmentPayload) -> Result<Self, Self::Error> {
        let text = payload.text.ok_or(SegmentValidationError::MissingText)?;
        let is_partial = payload
            .is_partial
            .ok_or(SegmentValidationError::MissingPartialFlag)?;
        Ok(Self { text, is_partial })
    }
}

/// Failure reported by the external recognition source.
#[derive(Debug)]
pub struct SegmentSourceError {
    pub message: String,
}

impl Display for SegmentSourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment source failure: {}", self.message)
    }
}

impl Error for SegmentSourceError {}

/// External recognition source, polled once per dictation tick.
pub trait SegmentSource {
    /// Returns every segment produced since the previous poll.
    fn latest_segments(&mut self) -> Result<Vec<SegmentPayload>, SegmentSourceError>;
}

/// Ingestion-layer error.
#[derive(Debug)]
pub enum IngestError {
    Source(SegmentSourceError),
    Consistency(ConsistencyError),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            Self::Consistency(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Consistency(err) => Some(err),
        }
    }
}

impl From<SegmentSourceError> for IngestError {
    fn from(value: SegmentSourceError) -> Self {
        Self::Source(value)
    }
}

impl From<ConsistencyError> for IngestError {
    fn from(value: ConsistencyError) -> Self {
        Self::Consistency(value)
    }
}

/// Merges the live segment stream into the document's trailing position.
///
/// Holds a dedicated last-live-span pointer, independent of wherever the
/// user's caret currently is.
#[derive(Debug, Default)]
pub struct IngestController {
    running: bool,
    last_live: Option<SpanId>,
}

impl IngestController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts ingestion, re-attaching to the document's trailing partial
    /// span when one survived an earlier pause.
    pub fn start(&mut self, document: &Document) {
        self.running = true;
        self.last_live = document.trailing_partial();
        debug!("event=ingest_start module=ingest status=ok");
    }

    /// Stops ingestion synchronously.
    ///
    /// The document is left untouched; callers stop their timer or
    /// subscription before tearing down the audio source.
    pub fn stop(&mut self) {
        self.running = false;
        debug!("event=ingest_stop module=ingest status=ok");
    }

    /// Polls the source once and merges the batch.
    ///
    /// A no-op when stopped: the source is not even polled, so a segment
    /// delivered after `stop` can never mutate the document. Returns one
    /// insert operation per span finalized by this batch.
    pub fn tick<S: SegmentSource>(
        &mut self,
        document: &mut Document,
        source: &mut S,
    ) -> Result<Vec<ContentOp>, IngestError> {
        if !self.running {
            return Ok(Vec::new());
        }

        let payloads = source.latest_segments()?;
        let mut ops = Vec::new();
        for payload in payloads {
            let segment = match Segment::try_from(payload) {
                Ok(segment) => segment,
                Err(err) => {
                    warn!("event=segment_dropped module=ingest status=warn reason={err}");
                    continue;
                }
            };
            self.apply(document, segment, &mut ops)?;
        }
        Ok(ops)
    }

    fn apply(
        &mut self,
        document: &mut Document,
        segment: Segment,
        ops: &mut Vec<ContentOp>,
    ) -> Result<(), IngestError> {
        let live = self
            .last_live
            .and_then(|id| document.span(id))
            .filter(|span| span.partial)
            .map(|span| span.id);

        match live {
            Some(span_id) => {
                // Replace, never concatenate: each partial carries the full
                // revised text.
                document.update_span_text(span_id, segment.text)?;
                if !segment.is_partial {
                    document.set_span_partial(span_id, false)?;
                    if let Some(record) = document.record_for(span_id) {
                        debug!(
                            "event=segment_final module=ingest status=ok span={span_id}"
                        );
                        ops.push(ContentOp {
                            kind: ContentOpKind::Insert,
                            record,
                        });
                    }
                }
            }
            None => {
                let block_id = match document.blocks().last() {
                    Some(block) if block.kind == BlockKind::Paragraph => block.id,
                    _ => document.append_block(BlockKind::Paragraph),
                };
                let span_id =
                    document.append_span(block_id, segment.text, segment.is_partial)?;
                self.last_live = Some(span_id);
                if !segment.is_partial {
                    if let Some(record) = document.record_for(span_id) {
                        ops.push(ContentOp {
                            kind: ContentOpKind::Insert,
                            record,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Segment, SegmentPayload, SegmentValidationError};

    #[test]
    fn payload_without_flag_is_rejected() {
        let payload = SegmentPayload {
            text: Some("hello".to_string()),
            is_partial: None,
        };
        assert_eq!(
            Segment::try_from(payload).unwrap_err(),
            SegmentValidationError::MissingPartialFlag
        );
    }
}
