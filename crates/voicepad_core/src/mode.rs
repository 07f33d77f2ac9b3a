//! Editor mode state machine.
//!
//! # Responsibility
//! - Track which interaction mode the editor is in.
//! - Enforce the legal transitions between modes.
//!
//! # Invariants
//! - Selection changes never interrupt an active dictation.
//! - Stopping dictation always lands back in [`EditorMode::Editing`].

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Editing,
    Dictating,
    Selection,
}

/// Tracks the current editor mode and applies transition rules.
#[derive(Debug)]
pub struct EditorModeMachine {
    mode: EditorMode,
}

impl EditorModeMachine {
    pub fn new() -> Self {
        Self {
            mode: EditorMode::Editing,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn is_dictating(&self) -> bool {
        self.mode == EditorMode::Dictating
    }

    /// Enters dictation from any mode.
    pub fn start_dictation(&mut self) {
        self.transition(EditorMode::Dictating);
    }

    /// Leaves dictation and returns to plain editing.
    pub fn stop_dictation(&mut self) {
        self.transition(EditorMode::Editing);
    }

    /// Explicit host command: jump straight to the requested mode.
    ///
    /// Unlike [`Self::selection_changed`], this is never ignored; the host
    /// asked for the mode by name.
    pub fn set_mode(&mut self, mode: EditorMode) {
        self.transition(mode);
    }

    /// Reacts to a selection change in the host editor.
    ///
    /// A collapsed selection (a caret) means editing, an expanded one means
    /// selection mode. Ignored entirely while dictating.
    pub fn selection_changed(&mut self, collapsed: bool) {
        if self.mode == EditorMode::Dictating {
            return;
        }

        let next = if collapsed {
            EditorMode::Editing
        } else {
            EditorMode::Selection
        };
        self.transition(next);
    }

    fn transition(&mut self, next: EditorMode) {
        if self.mode == next {
            return;
        }

        debug!(
            "event=mode_change module=mode status=ok from={:?} to={:?}",
            self.mode, next
        );
        self.mode = next;
    }
}

impl Default for EditorModeMachine {
    fn default() -> Self {
        Self::new()
    }
}
