use voicepad_core::model::document::{BlockKind, ConsistencyError, Document};
use voicepad_core::ContentKind;

#[test]
fn serialize_load_roundtrip_preserves_structure_and_order() {
    let mut doc = Document::new(42);
    let intro = doc.append_block(BlockKind::Paragraph);
    let first = doc.append_span(intro, "Hello ", false).unwrap();
    let second = doc.append_span(intro, "world.", false).unwrap();
    doc.append_block(BlockKind::Linebreak);
    let title = doc.append_block(BlockKind::Headline);
    doc.append_span(title, "Notes", false).unwrap();
    let outro = doc.append_block(BlockKind::Paragraph);
    doc.append_span(outro, "Bye.", false).unwrap();

    let records = doc.serialize();
    let loaded = Document::load(42, &records).unwrap();

    assert_eq!(loaded.blocks().len(), 4);
    assert_eq!(loaded.blocks()[0].kind, BlockKind::Paragraph);
    assert_eq!(loaded.blocks()[0].spans.len(), 2);
    assert_eq!(loaded.blocks()[0].spans[0].id, first);
    assert_eq!(loaded.blocks()[0].spans[1].id, second);
    assert_eq!(loaded.blocks()[1].kind, BlockKind::Linebreak);
    assert_eq!(loaded.blocks()[2].kind, BlockKind::Headline);
    assert_eq!(loaded.blocks()[2].id, title);
    assert_eq!(loaded.blocks()[2].text(), "Notes");
    assert_eq!(loaded.blocks()[3].text(), "Bye.");
}

#[test]
fn partial_spans_never_reach_serialized_records() {
    let mut doc = Document::new(1);
    let block = doc.append_block(BlockKind::Paragraph);
    let settled = doc.append_span(block, "said already", false).unwrap();
    let live = doc.append_span(block, "still talking", true).unwrap();

    let records = doc.serialize();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, "said already");
    assert!(doc.record_for(live).is_none());
    assert!(doc.record_for(settled).is_some());

    let loaded = Document::load(1, &records).unwrap();
    assert!(loaded.trailing_partial().is_none());
    assert_eq!(loaded.export_text(), "said already");
}

#[test]
fn adjacent_paragraphs_stay_separate_across_a_roundtrip() {
    let mut doc = Document::new(1);
    let first = doc.append_block(BlockKind::Paragraph);
    doc.append_span(first, "one", false).unwrap();
    let second = doc.append_block(BlockKind::Paragraph);
    doc.append_span(second, "two", false).unwrap();

    let loaded = Document::load(1, &doc.serialize()).unwrap();
    assert_eq!(loaded.blocks().len(), 2);
    assert_eq!(loaded.blocks()[0].text(), "one");
    assert_eq!(loaded.blocks()[1].text(), "two");
}

#[test]
fn span_split_keeps_identity_on_the_left() {
    let mut doc = Document::new(1);
    let block = doc.append_block(BlockKind::Paragraph);
    let span = doc.append_span(block, "Hello", false).unwrap();

    let (left, right) = doc.split_span_at(span, 2).unwrap();
    assert_eq!(left, span);
    assert_ne!(right, span);
    assert_eq!(doc.span(left).unwrap().text, "He");
    assert_eq!(doc.span(right).unwrap().text, "llo");
}

#[test]
fn split_at_the_end_yields_an_empty_right_span() {
    let mut doc = Document::new(1);
    let block = doc.append_block(BlockKind::Paragraph);
    let span = doc.append_span(block, "Hello", false).unwrap();

    let (_, right) = doc.split_span_at(span, 5).unwrap();
    assert_eq!(doc.span(right).unwrap().text, "");

    let err = doc.split_span_at(span, 99).unwrap_err();
    assert!(matches!(err, ConsistencyError::SplitOutOfBounds { .. }));
}

#[test]
fn block_split_moves_trailing_spans_into_the_new_block() {
    let mut doc = Document::new(1);
    let block = doc.append_block(BlockKind::Paragraph);
    let first = doc.append_span(block, "one two", false).unwrap();
    let tail = doc.append_span(block, " three", false).unwrap();

    let (left, right) = doc.split_block_at(block, first, 3).unwrap();
    assert_eq!(left, block);

    let left_block = doc.block(left).unwrap();
    let right_block = doc.block(right).unwrap();
    assert_eq!(left_block.text(), "one");
    assert_eq!(right_block.text(), " two three");
    assert_eq!(right_block.spans.last().unwrap().id, tail);
}

#[test]
fn partial_flag_moves_to_the_right_half_of_a_split() {
    let mut doc = Document::new(1);
    let block = doc.append_block(BlockKind::Paragraph);
    let span = doc.append_span(block, "speaking", true).unwrap();

    let (left, right) = doc.split_span_at(span, 4).unwrap();
    assert!(!doc.span(left).unwrap().partial);
    assert!(doc.span(right).unwrap().partial);
    assert_eq!(doc.trailing_partial(), Some(right));
}

#[test]
fn export_renders_blocks_as_lines() {
    let mut doc = Document::new(1);
    let title = doc.append_block(BlockKind::Headline);
    doc.append_span(title, "Meeting", false).unwrap();
    doc.append_block(BlockKind::Linebreak);
    let body = doc.append_block(BlockKind::Paragraph);
    doc.append_span(body, "First point. ", false).unwrap();
    doc.append_span(body, "Second point.", false).unwrap();

    assert_eq!(doc.export_text(), "Meeting\n\nFirst point. Second point.");
}

#[test]
fn load_rejects_duplicate_record_ids() {
    let mut doc = Document::new(1);
    let block = doc.append_block(BlockKind::Paragraph);
    doc.append_span(block, "once", false).unwrap();

    let mut records = doc.serialize();
    let mut dup = records[0].clone();
    dup.order_index += 1;
    records.push(dup);

    let err = Document::load(1, &records).unwrap_err();
    assert!(matches!(err, ConsistencyError::DuplicateId(_)));
}

#[test]
fn serialized_records_carry_the_expected_kinds() {
    let mut doc = Document::new(9);
    let para = doc.append_block(BlockKind::Paragraph);
    doc.append_span(para, "text", false).unwrap();
    doc.append_block(BlockKind::Linebreak);
    let title = doc.append_block(BlockKind::Headline);
    doc.append_span(title, "head", false).unwrap();

    let kinds: Vec<ContentKind> = doc
        .serialize()
        .iter()
        .map(|record| record.content_type)
        .collect();
    assert_eq!(
        kinds,
        vec![ContentKind::Text, ContentKind::Linebreak, ContentKind::Headline]
    );
}
