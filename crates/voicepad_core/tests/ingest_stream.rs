use std::collections::VecDeque;
use voicepad_core::ingest::{SegmentSourceError, SegmentPayload, SegmentSource};
use voicepad_core::model::document::{BlockKind, Document};
use voicepad_core::reconcile::ContentOpKind;
use voicepad_core::IngestController;

struct ScriptedSource {
    batches: VecDeque<Vec<SegmentPayload>>,
    polls: usize,
}

impl ScriptedSource {
    fn new(batches: Vec<Vec<SegmentPayload>>) -> Self {
        Self {
            batches: batches.into(),
            polls: 0,
        }
    }
}

impl SegmentSource for ScriptedSource {
    fn latest_segments(&mut self) -> Result<Vec<SegmentPayload>, SegmentSourceError> {
        self.polls += 1;
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

fn payload(text: &str, is_partial: bool) -> SegmentPayload {
    SegmentPayload {
        text: Some(text.to_string()),
        is_partial: Some(is_partial),
    }
}

#[test]
fn partial_revisions_replace_text_until_finalized() {
    let mut doc = Document::new(1);
    let mut source = ScriptedSource::new(vec![
        vec![payload("Hel", true)],
        vec![payload("Hello", true)],
        vec![payload("Hello world", false)],
    ]);

    let mut ingest = IngestController::new();
    ingest.start(&doc);

    assert!(ingest.tick(&mut doc, &mut source).unwrap().is_empty());
    assert_eq!(doc.last_span().unwrap().text, "Hel");

    assert!(ingest.tick(&mut doc, &mut source).unwrap().is_empty());
    assert_eq!(doc.last_span().unwrap().text, "Hello");

    let ops = ingest.tick(&mut doc, &mut source).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, ContentOpKind::Insert);
    assert_eq!(ops[0].record.content, "Hello world");

    assert_eq!(doc.blocks().len(), 1);
    assert_eq!(doc.blocks()[0].spans.len(), 1);
    assert!(doc.trailing_partial().is_none());
}

#[test]
fn stopped_controller_never_polls_the_source() {
    let mut doc = Document::new(1);
    let mut source = ScriptedSource::new(vec![vec![payload("late arrival", false)]]);

    let mut ingest = IngestController::new();
    ingest.start(&doc);
    ingest.stop();

    let ops = ingest.tick(&mut doc, &mut source).unwrap();
    assert!(ops.is_empty());
    assert_eq!(source.polls, 0);
    assert!(doc.is_empty());
}

#[test]
fn stop_keeps_a_pending_partial_and_restart_reattaches() {
    let mut doc = Document::new(1);
    let mut source = ScriptedSource::new(vec![
        vec![payload("half a tho", true)],
        vec![payload("half a thought, finished", false)],
    ]);

    let mut ingest = IngestController::new();
    ingest.start(&doc);
    ingest.tick(&mut doc, &mut source).unwrap();
    ingest.stop();

    let live = doc.trailing_partial().unwrap();
    assert_eq!(doc.span(live).unwrap().text, "half a tho");

    ingest.start(&doc);
    let ops = ingest.tick(&mut doc, &mut source).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(doc.span(live).unwrap().text, "half a thought, finished");
    assert!(doc.trailing_partial().is_none());
}

#[test]
fn dictation_after_a_headline_opens_a_new_paragraph() {
    let mut doc = Document::new(1);
    let title = doc.append_block(BlockKind::Headline);
    doc.append_span(title, "Agenda", false).unwrap();

    let mut source = ScriptedSource::new(vec![vec![payload("first item", false)]]);
    let mut ingest = IngestController::new();
    ingest.start(&doc);
    ingest.tick(&mut doc, &mut source).unwrap();

    assert_eq!(doc.blocks().len(), 2);
    assert_eq!(doc.blocks()[1].kind, BlockKind::Paragraph);
    assert_eq!(doc.blocks()[1].text(), "first item");
}

#[test]
fn malformed_payloads_are_dropped_without_poisoning_the_batch() {
    let mut doc = Document::new(1);
    let mut source = ScriptedSource::new(vec![vec![
        SegmentPayload {
            text: None,
            is_partial: Some(true),
        },
        SegmentPayload {
            text: Some("orphan".to_string()),
            is_partial: None,
        },
        payload("kept", false),
    ]]);

    let mut ingest = IngestController::new();
    ingest.start(&doc);
    let ops = ingest.tick(&mut doc, &mut source).unwrap();

    assert_eq!(ops.len(), 1);
    assert_eq!(doc.blocks().len(), 1);
    assert_eq!(doc.blocks()[0].text(), "kept");
}

#[test]
fn segment_payload_parses_camel_case_json() {
    let payload: SegmentPayload =
        serde_json::from_str(r#"{"text":"hi","isPartial":true}"#).unwrap();
    assert_eq!(payload.text.as_deref(), Some("hi"));
    assert_eq!(payload.is_partial, Some(true));
}
