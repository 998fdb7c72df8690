//! Invertible edit history: a tagged variant of recorded edits plus the
//! engine that drives undo/redo over a [`Document`].
//!
//! The engine mediates every edit made through it so each one produces a
//! [`HistoryElement`]; `undo`/`redo` walk that log by calling the element's
//! own `apply` with the direction reversed. Nested [`HistoryEngine::begin_group`]
//! / [`HistoryEngine::end_group`] calls coalesce several edits into one
//! undo/redo step.

use crate::coord::{MCoord, MCoordRange};
use crate::doc::core::Document;
use crate::doc::observer::{DocumentObserver, ObserverId};
use crate::error::{DocumentError, DocumentResult};

/// A single invertible edit, or a nested sequence of them.
///
/// `TextEdit` bytes may contain embedded `\n`s -- `apply` decomposes the
/// edit into the document's single-line primitives as it goes, so the
/// history log doesn't need a separate "multi-line edit" variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryElement {
    TextEdit {
        coord: MCoord,
        is_insertion: bool,
        bytes: Vec<u8>,
    },
    Group(Vec<HistoryElement>),
}

impl HistoryElement {
    /// Apply this element to `doc`, or its inverse if `reverse` is true.
    /// Returns the coordinate at the left edge of the affected text.
    ///
    /// On `Err`, `doc` is left exactly as it was found: a text edit whose
    /// recorded bytes no longer match the document is detected before any
    /// mutation happens, and a group rolls back whatever prefix of its
    /// children it had already applied.
    pub fn apply(&self, doc: &mut Document, reverse: bool) -> DocumentResult<MCoord> {
        match self {
            HistoryElement::TextEdit {
                coord,
                is_insertion,
                bytes,
            } => {
                let do_insert = *is_insertion ^ reverse;
                if do_insert {
                    Ok(doc.insert_multiline(*coord, bytes))
                } else {
                    let end = doc
                        .walk_coord_bytes(*coord, bytes.len() as isize)
                        .expect("history element's recorded range no longer fits in the document");
                    let range = MCoordRange::new(*coord, end);
                    let current = doc.get_text_spanning_lines(range);
                    if current != *bytes {
                        return Err(DocumentError::HistoryMismatch(format!(
                            "deletion at {} expected {} bytes matching the recorded text, found different content",
                            coord,
                            bytes.len()
                        )));
                    }
                    doc.delete_multiline(range);
                    Ok(*coord)
                }
            }
            HistoryElement::Group(children) => apply_group(children, doc, reverse),
        }
    }
}

fn apply_group(
    children: &[HistoryElement],
    doc: &mut Document,
    reverse: bool,
) -> DocumentResult<MCoord> {
    let indices: Vec<usize> = if reverse {
        (0..children.len()).rev().collect()
    } else {
        (0..children.len()).collect()
    };

    let mut applied: Vec<usize> = Vec::with_capacity(children.len());
    let mut last = MCoord::zero();

    for idx in indices {
        match children[idx].apply(doc, reverse) {
            Ok(coord) => {
                applied.push(idx);
                last = coord;
            }
            Err(e) => {
                for done in applied.into_iter().rev() {
                    children[done].apply(doc, !reverse).expect(
                        "history rollback failed: document and history log have diverged beyond recovery",
                    );
                }
                return Err(e);
            }
        }
    }

    Ok(last)
}

/// Counts of the elements making up a history log, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub text_edit_count: usize,
    pub group_count: usize,
}

impl HistoryStats {
    fn record(&mut self, elt: &HistoryElement) {
        match elt {
            HistoryElement::TextEdit { .. } => self.text_edit_count += 1,
            HistoryElement::Group(children) => {
                self.group_count += 1;
                for c in children {
                    self.record(c);
                }
            }
        }
    }
}

/// Wraps a [`Document`] so that every edit made through it is recorded as
/// an invertible [`HistoryElement`], and drives undo/redo over that log.
///
/// `history` holds the top-level recorded elements -- conceptually the
/// children of one implicit outermost group. `index` is the position in
/// `history` that corresponds to the document's current contents: undo
/// decrements it, redo increments it, and recording a fresh edit while
/// `index < history.len()` truncates the discarded "future" first.
pub struct HistoryEngine {
    doc: Document,
    history: Vec<HistoryElement>,
    index: usize,
    /// `index` at which the document matches its last-saved state, or
    /// `None` for "never saved".
    saved_index: Option<usize>,
    group_stack: Vec<Vec<HistoryElement>>,
    last_reported_unsaved: bool,
}

impl HistoryEngine {
    pub fn new(doc: Document) -> Self {
        HistoryEngine {
            doc,
            history: Vec::new(),
            index: 0,
            saved_index: None,
            group_stack: Vec::new(),
            last_reported_unsaved: false,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn add_observer(&mut self, observer: Box<dyn DocumentObserver>) -> ObserverId {
        self.doc.add_observer(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) {
        self.doc.remove_observer(id)
    }

    // ------------------------------------------------------------------
    // editing, routed through the history log
    // ------------------------------------------------------------------

    /// Insert (possibly multi-line) `text` at `coord`. Returns the
    /// coordinate at the end of the inserted text.
    pub fn insert_text(&mut self, coord: MCoord, text: &[u8]) -> MCoord {
        let end = self.doc.insert_multiline(coord, text);
        self.record(HistoryElement::TextEdit {
            coord,
            is_insertion: true,
            bytes: text.to_vec(),
        });
        end
    }

    /// Delete the (possibly multi-line) `range`. Returns the deleted bytes.
    pub fn delete_range(&mut self, range: MCoordRange) -> Vec<u8> {
        let range = range.rectified();
        let deleted = self.doc.get_text_spanning_lines(range);
        self.doc.delete_multiline(range);
        self.record(HistoryElement::TextEdit {
            coord: range.start,
            is_insertion: false,
            bytes: deleted.clone(),
        });
        deleted
    }

    /// Delete `range` and insert `text` in its place, as a single undo
    /// step. Returns the coordinate at the end of the inserted text.
    pub fn replace_range(&mut self, range: MCoordRange, text: &[u8]) -> MCoord {
        let range = range.rectified();
        if range.is_empty() {
            return self.insert_text(range.start, text);
        }
        self.begin_group();
        self.delete_range(range);
        let end = self.insert_text(range.start, text);
        self.end_group();
        end
    }

    fn record(&mut self, elt: HistoryElement) {
        if let Some(top) = self.group_stack.last_mut() {
            top.push(elt);
        } else {
            self.history.truncate(self.index);
            self.history.push(elt);
            self.index += 1;
        }
        self.sync_unsaved_changes();
    }

    // ------------------------------------------------------------------
    // grouping
    // ------------------------------------------------------------------

    pub fn begin_group(&mut self) {
        self.group_stack.push(Vec::new());
    }

    /// Close the innermost open group. A group with no recorded edits is
    /// discarded; a group with exactly one is unwrapped so it undoes just
    /// like a plain edit; anything larger becomes a `HistoryElement::Group`.
    pub fn end_group(&mut self) {
        let group = self
            .group_stack
            .pop()
            .expect("end_group: no open group to close");
        match group.len() {
            0 => {}
            1 => {
                let only = group.into_iter().next().unwrap();
                self.record(only);
            }
            _ => self.record(HistoryElement::Group(group)),
        }
    }

    pub fn in_group(&self) -> bool {
        !self.group_stack.is_empty()
    }

    // ------------------------------------------------------------------
    // undo / redo
    // ------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.history.len()
    }

    /// Undo the most recent recorded edit. Returns the coordinate at the
    /// left edge of the change.
    pub fn undo(&mut self) -> DocumentResult<MCoord> {
        assert!(self.can_undo(), "undo: nothing to undo");
        assert!(self.group_stack.is_empty(), "undo: a history group is still open");
        let target = self.index - 1;
        let coord = self.history[target].apply(&mut self.doc, true)?;
        self.index = target;
        self.sync_unsaved_changes();
        Ok(coord)
    }

    /// Redo the most recently undone edit.
    pub fn redo(&mut self) -> DocumentResult<MCoord> {
        assert!(self.can_redo(), "redo: nothing to redo");
        assert!(self.group_stack.is_empty(), "redo: a history group is still open");
        let coord = self.history[self.index].apply(&mut self.doc, false)?;
        self.index += 1;
        self.sync_unsaved_changes();
        Ok(coord)
    }

    // ------------------------------------------------------------------
    // saved-state tracking
    // ------------------------------------------------------------------

    /// True unless the document is known to match its last-saved contents:
    /// the saved index equals the current index, and no open group holds
    /// any recorded edits.
    pub fn unsaved_changes(&self) -> bool {
        if self.group_stack.iter().any(|g| !g.is_empty()) {
            return true;
        }
        self.saved_index != Some(self.index)
    }

    /// Record the current position as matching the on-disk contents.
    pub fn no_unsaved_changes(&mut self) {
        self.saved_index = Some(self.index);
        self.sync_unsaved_changes();
    }

    /// Discard all undo/redo history and open groups, keeping the current
    /// document contents. The saved-state marker is reset to "never".
    pub fn clear_history(&mut self) {
        self.index = 0;
        self.history.clear();
        self.group_stack.clear();
        self.saved_index = None;
        self.sync_unsaved_changes();
    }

    fn sync_unsaved_changes(&mut self) {
        let now = self.unsaved_changes();
        if now != self.last_reported_unsaved {
            self.last_reported_unsaved = now;
            self.doc.notify_unsaved_changes_change();
        }
    }

    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats::default();
        for elt in &self.history {
            stats.record(elt);
        }
        for group in &self.group_stack {
            for elt in group {
                stats.record(elt);
            }
        }
        stats
    }

    // ------------------------------------------------------------------
    // whole-file I/O
    // ------------------------------------------------------------------

    /// Replace the document with the contents of `path`. Clears all
    /// undo/redo history, since it no longer describes how the new
    /// contents came to be.
    pub fn read_file(&mut self, path: impl AsRef<std::path::Path>) -> anyhow::Result<()> {
        self.doc.read_file(path)?;
        self.clear_history();
        Ok(())
    }

    /// Write the document to `path` and, on success, mark the current
    /// history position as matching the saved file.
    pub fn write_file(&mut self, path: impl AsRef<std::path::Path>) -> anyhow::Result<()> {
        self.doc.write_file(path.as_ref())?;
        self.no_unsaved_changes();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_a_insert_and_undo() {
        // Four keystrokes, each its own undo step, mirroring the literal
        // scenario where "abcd" is typed one character at a time.
        let mut h = HistoryEngine::new(Document::new());
        h.insert_text(MCoord::new(0, 0), b"a");
        h.insert_text(MCoord::new(0, 1), b"b");
        h.insert_text(MCoord::new(0, 2), b"c");
        h.insert_text(MCoord::new(0, 3), b"d");
        assert_eq!(h.document().get_whole_file(), b"abcd");
        for _ in 0..4 {
            h.undo().unwrap();
        }
        assert_eq!(h.document().get_whole_file(), b"");
        assert!(!h.can_undo());
        for _ in 0..4 {
            h.redo().unwrap();
        }
        assert_eq!(h.document().get_whole_file(), b"abcd");
    }

    #[test]
    fn scenario_c_unsaved_changes_tracking() {
        let mut h = HistoryEngine::new(Document::new());
        h.no_unsaved_changes();
        assert!(!h.unsaved_changes());
        h.insert_text(MCoord::zero(), b"a");
        assert!(h.unsaved_changes());
        h.undo().unwrap();
        assert!(!h.unsaved_changes());
    }

    #[test]
    fn scenario_f_group_undo_is_atomic() {
        let mut h = HistoryEngine::new(Document::new());
        h.begin_group();
        h.insert_text(MCoord::zero(), b"ab");
        h.insert_text(MCoord::new(0, 2), b"cd");
        h.end_group();
        assert_eq!(h.document().get_whole_file(), b"abcd");

        h.undo().unwrap();
        assert_eq!(h.document().get_whole_file(), b"");

        h.redo().unwrap();
        assert_eq!(h.document().get_whole_file(), b"abcd");
    }

    #[test]
    fn redo_is_discarded_by_a_fresh_edit() {
        let mut h = HistoryEngine::new(Document::new());
        h.insert_text(MCoord::zero(), b"a");
        h.insert_text(MCoord::new(0, 1), b"b");
        h.undo().unwrap();
        assert!(h.can_redo());
        h.insert_text(MCoord::new(0, 1), b"c");
        assert!(!h.can_redo());
        assert_eq!(h.document().get_whole_file(), b"ac");
    }

    #[test]
    fn delete_then_undo_restores_exact_bytes() {
        let mut h = HistoryEngine::new(Document::new());
        h.insert_text(MCoord::zero(), b"hello world");
        h.delete_range(MCoordRange::new(MCoord::new(0, 5), MCoord::new(0, 11)));
        assert_eq!(h.document().get_whole_file(), b"hello");
        h.undo().unwrap();
        assert_eq!(h.document().get_whole_file(), b"hello world");
    }

    #[test]
    fn replace_range_undoes_as_one_step() {
        let mut h = HistoryEngine::new(Document::new());
        h.insert_text(MCoord::zero(), b"hello world");
        h.replace_range(MCoordRange::new(MCoord::new(0, 6), MCoord::new(0, 11)), b"there");
        assert_eq!(h.document().get_whole_file(), b"hello there");
        h.undo().unwrap();
        assert_eq!(h.document().get_whole_file(), b"hello world");
        h.undo().unwrap();
        assert_eq!(h.document().get_whole_file(), b"");
    }

    #[test]
    fn undo_detects_history_mismatch() {
        let mut h = HistoryEngine::new(Document::new());
        h.insert_text(MCoord::zero(), b"hello");
        // Mutate the document directly, bypassing the history engine, so
        // the recorded deletion no longer matches reality.
        h.doc.delete_text_bytes(MCoord::new(0, 0), 5);
        h.doc.insert_text(MCoord::zero(), b"wrong");
        let err = h.undo();
        assert!(err.is_err());
        // The document is untouched by the failed undo.
        assert_eq!(h.document().get_whole_file(), b"wrong");
    }

    #[test]
    fn empty_group_is_discarded() {
        let mut h = HistoryEngine::new(Document::new());
        h.begin_group();
        h.end_group();
        assert!(!h.can_undo());
    }

    #[test]
    fn singleton_group_unwraps_to_a_plain_edit() {
        let mut h = HistoryEngine::new(Document::new());
        h.begin_group();
        h.insert_text(MCoord::zero(), b"x");
        h.end_group();
        assert_eq!(h.stats().group_count, 0);
        assert_eq!(h.stats().text_edit_count, 1);
    }

    #[test]
    fn stats_count_groups_and_edits() {
        let mut h = HistoryEngine::new(Document::new());
        h.begin_group();
        h.insert_text(MCoord::zero(), b"ab");
        h.insert_text(MCoord::new(0, 2), b"cd");
        h.end_group();
        let stats = h.stats();
        assert_eq!(stats.group_count, 1);
        assert_eq!(stats.text_edit_count, 2);
    }
}
