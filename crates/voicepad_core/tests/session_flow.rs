use std::collections::VecDeque;
use voicepad_core::db::open_db_in_memory;
use voicepad_core::ingest::{SegmentPayload, SegmentSource, SegmentSourceError};
use voicepad_core::model::document::BlockKind;
use voicepad_core::{
    ContentRepository, EditorMode, EditorSession, QueryMode, SessionError,
    SqliteContentRepository, SqliteTranscriptRepository, TranscriptRepository,
};

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
fn dictate_save_reload_export_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("standup notes")
        .unwrap();

    let mut source = ScriptedSource::new(vec![
        vec![payload("We shi", true)],
        vec![payload("We shipped the", true)],
        vec![payload("We shipped the release.", false)],
    ]);

    {
        let repo = SqliteContentRepository::try_new(&conn).unwrap();
        let mut session = EditorSession::new(repo, transcript_id);

        session.start_dictation();
        assert_eq!(session.mode(), EditorMode::Dictating);
        for _ in 0..3 {
            session.tick_dictation(&mut source).unwrap();
        }
        session.stop_dictation();
        session.save_contents().unwrap();
    }

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);
    session.load_contents().unwrap();

    assert_eq!(session.export_text(), "We shipped the release.");
    assert!(session.document().trailing_partial().is_none());
}

#[test]
fn reconcile_and_split_are_refused_while_dictating() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("guarded")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    let mut source = ScriptedSource::new(vec![vec![payload("spoken text", false)]]);
    session.start_dictation();
    session.tick_dictation(&mut source).unwrap();

    let span = session.document().blocks()[0].spans[0].id;
    session.edit_span_text(span, "sneaky edit").unwrap();
    assert!(matches!(
        session.reconcile().unwrap_err(),
        SessionError::DictationActive
    ));
    assert!(matches!(
        session.split_at_caret(span, 3).unwrap_err(),
        SessionError::DictationActive
    ));

    session.stop_dictation();
    session.reconcile().unwrap();
    assert_eq!(session.document().blocks()[0].text(), "sneaky edit");
}

#[test]
fn enter_split_persists_both_halves() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("split me")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    let mut source = ScriptedSource::new(vec![vec![payload("Hello world", false)]]);
    session.start_dictation();
    session.tick_dictation(&mut source).unwrap();
    session.stop_dictation();

    let span = session.document().blocks()[0].spans[0].id;
    let caret = session.split_at_caret(span, 5).unwrap();

    assert_eq!(session.document().blocks().len(), 2);
    assert_eq!(session.document().blocks()[0].text(), "Hello");
    assert_eq!(session.document().blocks()[1].text(), " world");
    assert_eq!(session.document().blocks()[0].spans[0].id, span);
    assert_eq!(session.document().blocks()[1].spans[0].id, caret);

    // The split is flushed to the store immediately.
    let verify = SqliteContentRepository::try_new(&conn).unwrap();
    let rows = verify.load_contents(transcript_id).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].content, "Hello");
    assert_eq!(rows[1].content, " world");
}

#[test]
fn headline_command_inserts_framed_structure() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("structured")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    session.insert_headline("Action items");
    session.reconcile().unwrap();

    let kinds: Vec<BlockKind> = session
        .document()
        .blocks()
        .iter()
        .map(|block| block.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![BlockKind::Linebreak, BlockKind::Headline, BlockKind::Linebreak]
    );
    assert_eq!(session.export_text(), "\nAction items\n");

    let verify = SqliteContentRepository::try_new(&conn).unwrap();
    assert_eq!(verify.load_contents(transcript_id).unwrap().len(), 3);
}

#[test]
fn headline_edits_keep_the_block_identity() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("retitled")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    session.insert_headline("Draft title");
    session.reconcile().unwrap();

    let headline = session
        .document()
        .blocks()
        .iter()
        .find(|block| block.kind == BlockKind::Headline)
        .map(|block| block.id)
        .unwrap();
    let node = session
        .tree()
        .blocks()
        .iter()
        .find(|block| block.id == headline)
        .map(|block| block.spans[0].id)
        .unwrap();

    session.edit_span_text(node, "Final title").unwrap();
    session.reconcile().unwrap();

    assert_eq!(session.document().block(headline).unwrap().text(), "Final title");

    let verify = SqliteContentRepository::try_new(&conn).unwrap();
    let rows = verify.load_contents(transcript_id).unwrap();
    let row = rows.iter().find(|row| row.id == headline.to_string()).unwrap();
    assert_eq!(row.content, "Final title");
}

#[test]
fn replace_writes_back_through_the_model_to_the_store() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("find and replace")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    let mut source = ScriptedSource::new(vec![vec![payload("foo bar foo", false)]]);
    session.start_dictation();
    session.tick_dictation(&mut source).unwrap();
    session.stop_dictation();

    assert_eq!(session.search("foo", QueryMode::Plain).unwrap(), 2);
    assert_eq!(
        session.replace("baz", "foo", QueryMode::Plain, true).unwrap(),
        1
    );
    assert_eq!(session.export_text(), "baz bar baz");

    let verify = SqliteContentRepository::try_new(&conn).unwrap();
    let rows = verify.load_contents(transcript_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content, "baz bar baz");
}

#[test]
fn pause_save_resume_finalizes_without_an_id_collision() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("paused mid-sentence")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    let mut source = ScriptedSource::new(vec![
        vec![payload("half a tho", true)],
        vec![payload("half a thought, finished", false)],
    ]);

    session.start_dictation();
    session.tick_dictation(&mut source).unwrap();
    session.stop_dictation();
    session.save_contents().unwrap();

    // The dangling partial stays out of the store.
    let verify = SqliteContentRepository::try_new(&conn).unwrap();
    assert!(verify.load_contents(transcript_id).unwrap().is_empty());

    session.start_dictation();
    session.tick_dictation(&mut source).unwrap();
    session.stop_dictation();

    let rows = verify.load_contents(transcript_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content, "half a thought, finished");
    assert_eq!(session.export_text(), "half a thought, finished");
}

#[test]
fn replace_inside_a_dangling_partial_skips_the_store() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("live correction")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    let mut source = ScriptedSource::new(vec![vec![payload("foo pending", true)]]);
    session.start_dictation();
    session.tick_dictation(&mut source).unwrap();
    session.stop_dictation();

    assert_eq!(session.search("foo", QueryMode::Plain).unwrap(), 1);
    assert_eq!(
        session.replace("baz", "foo", QueryMode::Plain, true).unwrap(),
        1
    );
    assert_eq!(session.export_text(), "baz pending");

    let verify = SqliteContentRepository::try_new(&conn).unwrap();
    assert!(verify.load_contents(transcript_id).unwrap().is_empty());
}

#[test]
fn set_mode_routes_through_the_legal_transitions() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("mode commands")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    session.set_mode(EditorMode::Dictating);
    assert_eq!(session.mode(), EditorMode::Dictating);

    session.set_mode(EditorMode::Selection);
    assert_eq!(session.mode(), EditorMode::Selection);

    // Leaving dictation through set_mode stopped the controller.
    let mut source = ScriptedSource::new(vec![vec![payload("late", false)]]);
    session.tick_dictation(&mut source).unwrap();
    assert_eq!(source.polls, 0);
    assert!(session.document().is_empty());

    session.set_mode(EditorMode::Editing);
    assert_eq!(session.mode(), EditorMode::Editing);
}

#[test]
fn selection_changes_drive_mode_outside_dictation_only() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("modes")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    session.start_dictation();
    session.selection_changed(false);
    assert_eq!(session.mode(), EditorMode::Dictating);

    session.stop_dictation();
    session.selection_changed(false);
    assert_eq!(session.mode(), EditorMode::Selection);
    session.selection_changed(true);
    assert_eq!(session.mode(), EditorMode::Editing);
}

#[test]
fn ticks_outside_dictation_never_touch_the_source() {
    let conn = open_db_in_memory().unwrap();
    let transcript_id = SqliteTranscriptRepository::try_new(&conn)
        .unwrap()
        .create_transcript("idle")
        .unwrap();
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let mut session = EditorSession::new(repo, transcript_id);

    let mut source = ScriptedSource::new(vec![vec![payload("too late", false)]]);
    session.tick_dictation(&mut source).unwrap();

    assert_eq!(source.polls, 0);
    assert!(session.document().is_empty());
}
