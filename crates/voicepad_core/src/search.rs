//! Search, highlight and replace over the editable tree.
//!
//! # Responsibility
//! - Wrap case-insensitive matches in highlight runs, idempotently.
//! - Replace highlighted matches while preserving span identity.
//!
//! # Invariants
//! - Highlighting always starts from an unhighlighted tree; re-running the
//!   same query yields the same run structure, never deeper nesting.
//! - Plain queries are escaped before compilation; raw patterns require an
//!   explicit opt-in.

use crate::model::document::SpanId;
use crate::tree::{EditorTree, SpanNode, TextRun};
use regex::{Regex, RegexBuilder};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for pattern compilation.
#[derive(Debug)]
pub enum SearchError {
    InvalidPattern { pattern: String, message: String },
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid search pattern `{pattern}`: {message}")
            }
        }
    }
}

impl Error for SearchError {}

/// How a query string becomes a pattern.
///
/// Default is `Plain` to protect literal searches from pattern syntax;
/// `Regex` passes the query through unescaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Plain,
    Regex,
}

/// Highlights every case-insensitive match of `query` across all span
/// nodes, depth first.
///
/// Existing highlight runs are unwrapped back into plain text first, so the
/// operation is idempotent. An empty query is a silent no-op. Returns the
/// number of matches wrapped.
pub fn highlight(tree: &mut EditorTree, query: &str, mode: QueryMode) -> SearchResult<usize> {
    if query.trim().is_empty() {
        return Ok(0);
    }
    let pattern = compile(query, mode)?;
    clear_highlights(tree);

    let mut wrapped = 0;
    for block in tree.blocks_mut() {
        for span in &mut block.spans {
            wrapped += highlight_span(span, &pattern);
        }
    }
    Ok(wrapped)
}

/// Unwraps all highlight runs back into plain text, merging adjacent runs
/// so no marker fragments survive.
pub fn clear_highlights(tree: &mut EditorTree) {
    for block in tree.blocks_mut() {
        for span in &mut block.spans {
            if span.runs.iter().any(|run| run.highlighted) {
                let text = span.text();
                span.runs = vec![TextRun::plain(text)];
            }
        }
    }
}

/// Replaces the text of highlighted runs matching `search`.
///
/// Walks nodes depth first and rewrites the first matching marker, or every
/// one when `replace_all` is set; the marker is unwrapped afterward. A call
/// without a preceding highlight finds no markers and is a no-op, as are
/// empty search or replacement strings. Returns the ids of modified spans
/// so the caller can write the new text back into the model.
pub fn replace(
    tree: &mut EditorTree,
    replacement: &str,
    search: &str,
    mode: QueryMode,
    replace_all: bool,
) -> SearchResult<Vec<SpanId>> {
    if replacement.is_empty() || search.trim().is_empty() {
        return Ok(Vec::new());
    }
    let pattern = compile(search, mode)?;

    let mut changed: Vec<SpanId> = Vec::new();
    'blocks: for block in tree.blocks_mut() {
        for span in &mut block.spans {
            let mut touched = false;
            let mut done = false;
            for run in &mut span.runs {
                if run.highlighted && pattern.is_match(&run.text) {
                    run.text = replacement.to_string();
                    run.highlighted = false;
                    touched = true;
                    if !replace_all {
                        done = true;
                        break;
                    }
                }
            }
            if touched {
                merge_plain_runs(span);
                changed.push(span.id);
            }
            if done {
                break 'blocks;
            }
        }
    }
    Ok(changed)
}

fn compile(query: &str, mode: QueryMode) -> SearchResult<Regex> {
    let pattern = match mode {
        QueryMode::Plain => regex::escape(query),
        QueryMode::Regex => query.to_string(),
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| SearchError::InvalidPattern {
            pattern,
            message: err.to_string(),
        })
}

fn highlight_span(span: &mut SpanNode, pattern: &Regex) -> usize {
    let text = span.text();
    let mut runs = Vec::new();
    let mut cursor = 0;
    let mut matches = 0;

    for found in pattern.find_iter(&text) {
        if found.start() == found.end() {
            // Zero-width matches would loop forever; skip them.
            continue;
        }
        if found.start() > cursor {
            runs.push(TextRun::plain(&text[cursor..found.start()]));
        }
        runs.push(TextRun {
            text: found.as_str().to_string(),
            highlighted: true,
        });
        cursor = found.end();
        matches += 1;
    }

    if matches > 0 {
        if cursor < text.len() {
            runs.push(TextRun::plain(&text[cursor..]));
        }
        span.runs = runs;
    }
    matches
}

fn merge_plain_runs(span: &mut SpanNode) {
    let mut merged: Vec<TextRun> = Vec::new();
    for run in span.runs.drain(..) {
        match merged.last_mut() {
            Some(last) if !last.highlighted && !run.highlighted => {
                last.text.push_str(&run.text);
            }
            _ => merged.push(run),
        }
    }
    span.runs = merged;
}
