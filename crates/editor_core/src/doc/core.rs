//! The line-structured text buffer at the center of the crate.
//!
//! A document is a non-empty sequence of lines. Most lines sit in their own
//! small heap allocation ("cold"); exactly one line, at most, is hosted in
//! an auxiliary [`GapArray<u8>`] ("the recent line") so that repeated edits
//! at a single position -- the common case while typing -- are O(1)
//! amortized instead of reallocating a whole line per keystroke.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::Context;

use super::observer::{DocumentObserver, ObserverId};
use crate::coord::{MCoord, MCoordRange};
use crate::error::DocumentError;
use crate::gap::GapArray;

/// A cold (not currently being edited) line's content, or `None` for a
/// line that is either genuinely empty or is the recent line (whose
/// content lives in `recent_line` instead).
type ColdLine = Option<Box<[u8]>>;

pub struct Document {
    lines: GapArray<ColdLine>,
    /// Index of the line currently hosted in `recent_line`, if any.
    recent: Option<usize>,
    recent_line: GapArray<u8>,
    /// High-water mark of the longest line ever seen. Monotonically
    /// non-decreasing -- it is not revised downward even if that line is
    /// later shortened or deleted. This mirrors the source's own
    /// documented approximation rather than maintaining a precise
    /// interval map.
    longest_length_so_far: usize,
    observers: Vec<(u64, Box<dyn DocumentObserver>)>,
    next_observer_id: u64,
    version: u64,
    /// Armed only by tests, to exercise the atomicity of `read_file`. See
    /// `set_injected_read_error_countdown`.
    injected_error_countdown: Option<usize>,
}

impl Document {
    pub fn new() -> Self {
        let mut lines = GapArray::new();
        lines.insert(0, None);
        Document {
            lines,
            recent: None,
            recent_line: GapArray::new(),
            longest_length_so_far: 0,
            observers: Vec::new(),
            next_observer_id: 0,
            version: 0,
            injected_error_countdown: None,
        }
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    pub fn num_lines(&self) -> usize {
        self.lines.length()
    }

    pub fn is_empty_line(&self, line: usize) -> bool {
        self.line_length_bytes(line) == 0
    }

    pub fn line_length_bytes(&self, line: usize) -> usize {
        if self.recent == Some(line) {
            self.recent_line.length()
        } else {
            match self.lines.get(line) {
                Some(bytes) => bytes.len(),
                None => 0,
            }
        }
    }

    pub fn valid_coord(&self, tc: MCoord) -> bool {
        tc.line < self.num_lines() && tc.byte <= self.line_length_bytes(tc.line)
    }

    pub fn valid_range(&self, range: MCoordRange) -> bool {
        self.valid_coord(range.start) && self.valid_coord(range.end)
    }

    pub fn begin_coord(&self) -> MCoord {
        MCoord::zero()
    }

    pub fn end_coord(&self) -> MCoord {
        let last = self.num_lines() - 1;
        MCoord::new(last, self.line_length_bytes(last))
    }

    pub fn line_begin_coord(&self, line: usize) -> MCoord {
        MCoord::new(line, 0)
    }

    pub fn line_end_coord(&self, line: usize) -> MCoord {
        MCoord::new(line, self.line_length_bytes(line))
    }

    /// An approximation of the longest line ever seen in this document;
    /// see the field doc comment on `longest_length_so_far`.
    pub fn max_line_length_bytes(&self) -> usize {
        self.longest_length_so_far
    }

    /// Number of lines, not counting a final empty line that exists only
    /// because the file ended with a newline. Not the same thing `wc -l`
    /// reports for such a file, which counts the newline-delimited lines
    /// and so arrives at one less for the same reason in reverse.
    pub fn num_lines_except_final_empty(&self) -> usize {
        let n = self.num_lines();
        if n >= 1 && self.is_empty_line(n - 1) {
            n - 1
        } else {
            n
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn bump_version(&mut self) {
        self.version += 1;
    }

    // ------------------------------------------------------------------
    // content access
    // ------------------------------------------------------------------

    pub fn get_whole_line(&self, line: usize) -> Vec<u8> {
        if self.recent == Some(line) {
            self.recent_line.to_vec()
        } else {
            self.lines
                .get(line)
                .as_ref()
                .map(|b| b.to_vec())
                .unwrap_or_default()
        }
    }

    pub fn get_partial_line(&self, tc: MCoord, length_bytes: usize) -> Vec<u8> {
        assert!(tc.byte + length_bytes <= self.line_length_bytes(tc.line));
        let whole = self.get_whole_line(tc.line);
        whole[tc.byte..tc.byte + length_bytes].to_vec()
    }

    /// The text covered by `range`, with line breaks as `\n`.
    pub fn get_text_spanning_lines(&self, range: MCoordRange) -> Vec<u8> {
        let range = range.rectified();
        assert!(self.valid_range(range));
        if range.start.line == range.end.line {
            return self.get_partial_line(range.start, range.end.byte - range.start.byte);
        }
        let mut out = Vec::new();
        let first_len = self.line_length_bytes(range.start.line) - range.start.byte;
        out.extend(self.get_partial_line(range.start, first_len));
        out.push(b'\n');
        for line in (range.start.line + 1)..range.end.line {
            out.extend(self.get_whole_line(line));
            out.push(b'\n');
        }
        out.extend(self.get_partial_line(MCoord::new(range.end.line, 0), range.end.byte));
        out
    }

    pub fn count_bytes_in_range(&self, range: MCoordRange) -> usize {
        let range = range.rectified();
        assert!(self.valid_range(range));
        if range.start.line == range.end.line {
            return range.end.byte - range.start.byte;
        }
        let mut total = self.line_length_bytes(range.start.line) - range.start.byte + 1;
        for line in (range.start.line + 1)..range.end.line {
            total += self.line_length_bytes(line) + 1;
        }
        total + range.end.byte
    }

    pub fn count_leading_spaces_tabs(&self, line: usize) -> usize {
        let bytes = self.get_whole_line(line);
        bytes.iter().take_while(|&&b| is_space_or_tab(b)).count()
    }

    pub fn count_trailing_spaces_tabs(&self, line: usize) -> usize {
        let bytes = self.get_whole_line(line);
        bytes.iter().rev().take_while(|&&b| is_space_or_tab(b)).count()
    }

    /// Clamp `tc` to a valid coordinate in this document. Returns the
    /// clamped coordinate and whether it differs from `tc`.
    pub fn adjust_mcoord(&self, tc: MCoord) -> (MCoord, bool) {
        let line = tc.line.min(self.num_lines() - 1);
        let byte = tc.byte.min(self.line_length_bytes(line));
        let adjusted = MCoord::new(line, byte);
        (adjusted, adjusted != tc)
    }

    /// Clamp `range`'s endpoints to validity independently -- `start` and
    /// `end` are never swapped -- then, if the clamped `end` still
    /// precedes `start`, collapse `end` down to `start` rather than
    /// rectifying by exchanging them. Returns the adjusted range and
    /// whether it differs from the input.
    pub fn adjust_mcoord_range(&self, range: MCoordRange) -> (MCoordRange, bool) {
        let (start, start_changed) = self.adjust_mcoord(range.start);
        let (mut end, end_changed) = self.adjust_mcoord(range.end);
        let mut changed = start_changed || end_changed;
        if end < start {
            end = start;
            changed = true;
        }
        (MCoordRange::new(start, end), changed)
    }

    /// Move `tc` by `delta` bytes through the flattened document, where
    /// each line break counts as one byte. Returns `None` if that would
    /// walk off either end, in which case `tc` is unchanged from the
    /// caller's perspective (nothing is mutated).
    pub fn walk_coord_bytes(&self, tc: MCoord, delta: isize) -> Option<MCoord> {
        assert!(self.valid_coord(tc));
        let mut tc = tc;
        if delta >= 0 {
            let mut remaining = delta as usize;
            while remaining > 0 {
                let len = self.line_length_bytes(tc.line);
                if tc.byte == len {
                    if tc.line + 1 >= self.num_lines() {
                        return None;
                    }
                    tc.line += 1;
                    tc.byte = 0;
                } else {
                    tc.byte += 1;
                }
                remaining -= 1;
            }
        } else {
            let mut remaining = (-delta) as usize;
            while remaining > 0 {
                if tc.byte == 0 {
                    if tc.line == 0 {
                        return None;
                    }
                    tc.line -= 1;
                    tc.byte = self.line_length_bytes(tc.line);
                } else {
                    tc.byte -= 1;
                }
                remaining -= 1;
            }
        }
        Some(tc)
    }

    /// The reverse-direction walk; spelled out as its own method only
    /// because callers read better with it, not because the underlying
    /// traversal differs.
    pub fn walk_backwards(&self, tc: MCoord, len: usize) -> Option<MCoord> {
        self.walk_coord_bytes(tc, -(len as isize))
    }

    // ------------------------------------------------------------------
    // recent-line cache protocol
    // ------------------------------------------------------------------

    fn detach_recent(&mut self) {
        if let Some(r) = self.recent {
            let bytes = self.recent_line.to_vec();
            *self.lines.get_mut(r) = if bytes.is_empty() {
                None
            } else {
                Some(bytes.into_boxed_slice())
            };
            self.recent_line.clear();
            self.recent = None;
        }
    }

    fn attach_recent(&mut self, line: usize, gap_hint: usize) {
        if self.recent == Some(line) {
            return;
        }
        self.detach_recent();
        let content = self.lines.get_mut(line).take();
        self.recent_line.clear();
        if let Some(bytes) = content {
            self.recent_line.fill_from_array(&bytes, gap_hint.min(bytes.len()));
        }
        self.recent = Some(line);
    }

    // ------------------------------------------------------------------
    // primitive mutations
    // ------------------------------------------------------------------

    pub fn insert_line(&mut self, line: usize) {
        assert!(line <= self.num_lines());
        self.lines.insert(line, None);
        if let Some(r) = self.recent {
            if r >= line {
                self.recent = Some(r + 1);
            }
        }
        self.bump_version();
        self.dispatch(|doc, obs| obs.observe_insert_line(doc, line));
    }

    pub fn delete_line(&mut self, line: usize) {
        assert!(self.num_lines() > 1, "cannot delete the document's only line");
        assert!(self.is_empty_line(line), "deleteLine requires an empty line");
        if self.recent == Some(line) {
            self.recent_line.clear();
            self.recent = None;
        }
        self.lines.remove(line);
        if let Some(r) = self.recent {
            if r > line {
                self.recent = Some(r - 1);
            }
        }
        self.bump_version();
        self.dispatch(|doc, obs| obs.observe_delete_line(doc, line));
    }

    /// Insert `bytes` (which must not contain `\n`) at `tc`.
    pub fn insert_text(&mut self, tc: MCoord, bytes: &[u8]) {
        assert!(self.valid_coord(tc));
        debug_assert!(!bytes.contains(&b'\n'), "insert_text: embedded newline");
        if bytes.is_empty() {
            return;
        }
        if tc.byte == 0 && self.recent != Some(tc.line) && self.is_empty_line(tc.line) {
            *self.lines.get_mut(tc.line) = Some(bytes.to_vec().into_boxed_slice());
        } else {
            self.attach_recent(tc.line, tc.byte);
            self.recent_line.insert_many(tc.byte, bytes);
        }
        let new_len = self.line_length_bytes(tc.line);
        if new_len > self.longest_length_so_far {
            self.longest_length_so_far = new_len;
        }
        self.bump_version();
        self.dispatch(|doc, obs| obs.observe_insert_text(doc, tc, bytes));
    }

    /// Delete `n` bytes starting at `tc`, all on a single line.
    pub fn delete_text_bytes(&mut self, tc: MCoord, n: usize) {
        if n == 0 {
            return;
        }
        assert!(self.valid_coord(tc));
        assert!(tc.byte + n <= self.line_length_bytes(tc.line));
        if tc.byte == 0 && n == self.line_length_bytes(tc.line) && self.recent != Some(tc.line) {
            *self.lines.get_mut(tc.line) = None;
        } else {
            self.attach_recent(tc.line, tc.byte);
            self.recent_line.remove_many(tc.byte, n);
        }
        self.bump_version();
        self.dispatch(|doc, obs| obs.observe_delete_text(doc, tc, n));
    }

    // ------------------------------------------------------------------
    // composite mutations
    // ------------------------------------------------------------------

    /// Insert possibly-multiline `text` at `tc`. Embedded `\n`s are
    /// decomposed into `insert_text`/`insert_line` calls. When the
    /// insertion point has trailing content on its starting line, that
    /// content ("excess") is floated down past the inserted text onto the
    /// final line produced, so the net effect reads exactly as "this text
    /// was typed here", not "this line was truncated".
    pub fn insert_multiline(&mut self, tc: MCoord, text: &[u8]) -> MCoord {
        assert!(self.valid_coord(tc));
        let begin_line = tc.line;
        let mut tc = tc;
        let mut excess: Option<Vec<u8>> = None;
        let mut p = 0usize;
        while p < text.len() {
            let nl = text[p..].iter().position(|&b| b == b'\n').map(|i| p + i);
            let seg_end = nl.unwrap_or(text.len());
            let seg = &text[p..seg_end];
            if !seg.is_empty() {
                self.insert_text(tc, seg);
                tc.byte += seg.len();
            }
            match nl {
                Some(nl_idx) => {
                    if tc.line == begin_line && tc.byte < self.line_length_bytes(tc.line) {
                        assert!(excess.is_none(), "insert_multiline: excess captured twice");
                        let tail_len = self.line_length_bytes(tc.line) - tc.byte;
                        let tail = self.get_partial_line(tc, tail_len);
                        self.delete_text_bytes(tc, tail_len);
                        excess = Some(tail);
                    }
                    tc.line += 1;
                    self.insert_line(tc.line);
                    tc.byte = 0;
                    p = nl_idx + 1;
                }
                None => p = seg_end,
            }
        }
        if let Some(tail) = excess {
            if !tail.is_empty() {
                self.insert_text(tc, &tail);
            }
            tc.byte += tail.len();
        }
        tc
    }

    /// Delete the (possibly multiline) `range`. The mirror image of
    /// `insert_multiline`'s excess-floating: when the range ends partway
    /// through a line, the surviving tail of that line is spliced onto
    /// the end of the range's starting line.
    pub fn delete_multiline(&mut self, range: MCoordRange) {
        let range = range.rectified();
        assert!(self.valid_range(range));
        if range.start.line == range.end.line {
            self.delete_text_bytes(range.start, range.end.byte - range.start.byte);
            return;
        }

        let first_tail_len = self.line_length_bytes(range.start.line) - range.start.byte;
        if first_tail_len > 0 {
            self.delete_text_bytes(range.start, first_tail_len);
        }

        let middle_line = range.start.line + 1;
        let mut lines_to_drop = range.end.line - range.start.line - 1;
        while lines_to_drop > 0 {
            let len = self.line_length_bytes(middle_line);
            if len > 0 {
                self.delete_text_bytes(MCoord::new(middle_line, 0), len);
            }
            self.delete_line(middle_line);
            lines_to_drop -= 1;
        }

        // `middle_line` now holds what was originally `range.end.line`.
        if range.end.byte > 0 {
            self.delete_text_bytes(MCoord::new(middle_line, 0), range.end.byte);
        }
        let splice = self.get_whole_line(middle_line);
        if !splice.is_empty() {
            self.delete_text_bytes(MCoord::new(middle_line, 0), splice.len());
        }
        self.delete_line(middle_line);
        let join_at = self.line_end_coord(range.start.line);
        if !splice.is_empty() {
            self.insert_text(join_at, &splice);
        }
    }

    /// Delete `range`, then insert `text` at its (rectified) start.
    /// Returns the coordinate at the end of the inserted text.
    pub fn replace_multiline_range(&mut self, range: MCoordRange, text: &[u8]) -> MCoord {
        let range = range.rectified();
        if !range.is_empty() {
            self.delete_multiline(range);
        }
        self.insert_multiline(range.start, text)
    }

    pub fn get_whole_file(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in 0..self.num_lines() {
            if line > 0 {
                out.push(b'\n');
            }
            out.extend(self.get_whole_line(line));
        }
        out
    }

    pub fn get_whole_file_string(&self) -> String {
        String::from_utf8_lossy(&self.get_whole_file()).into_owned()
    }

    /// Reset to a single empty line, discarding all content (but not
    /// observers).
    pub fn clear(&mut self) {
        self.lines.clear();
        self.lines.insert(0, None);
        self.recent = None;
        self.recent_line.clear();
        self.longest_length_so_far = 0;
        self.bump_version();
    }

    fn populate_from_bytes(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.insert_multiline(MCoord::zero(), bytes);
        }
    }

    pub fn replace_whole_file(&mut self, bytes: &[u8]) {
        let mut tmp = Document::new();
        tmp.populate_from_bytes(bytes);
        self.swap_with(&mut tmp);
    }

    pub fn replace_whole_file_string(&mut self, s: &str) {
        self.replace_whole_file(s.as_bytes());
    }

    /// Exchange the full contents (lines, recent-line cache, longest-line
    /// tracking, version) of two documents, then notify `self`'s observers
    /// of a total change. Observers themselves stay put -- each instance
    /// keeps the observers that were registered against it.
    pub fn swap_with(&mut self, other: &mut Self) {
        self.lines.swap_with(&mut other.lines);
        std::mem::swap(&mut self.recent, &mut other.recent);
        self.recent_line.swap_with(&mut other.recent_line);
        std::mem::swap(&mut self.longest_length_so_far, &mut other.longest_length_so_far);
        std::mem::swap(&mut self.version, &mut other.version);
        self.bump_version();
        self.dispatch(|doc, obs| obs.observe_total_change(doc));
    }

    // ------------------------------------------------------------------
    // file I/O
    // ------------------------------------------------------------------

    /// Replace the contents of `self` with the contents of `path`.
    /// Guaranteed to only modify `self` if the read succeeds end to end;
    /// on failure `self` is left exactly as it was.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let mut tmp = Document::new();
        tmp.injected_error_countdown = self.injected_error_countdown;
        tmp.non_atomic_read_file(path.as_ref())?;
        self.swap_with(&mut tmp);
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let bytes = self.get_whole_file();
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Not exposed outside the crate: may leave `self` in an inconsistent
    /// state on failure. Only safe to call on a fresh, private `Document`
    /// that will be discarded on error and swapped in on success.
    fn non_atomic_read_file(&mut self, path: &Path) -> anyhow::Result<()> {
        use std::io::Read;
        let mut file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut buf = [0u8; 8192];
        let mut tc = MCoord::zero();
        let mut total_read = 0usize;
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if n == 0 {
                break;
            }
            total_read += n;
            self.check_injected_error(total_read)?;
            tc = self.insert_multiline(tc, &buf[..n]);
        }
        Ok(())
    }

    fn check_injected_error(&self, total_read: usize) -> anyhow::Result<()> {
        if let Some(countdown) = self.injected_error_countdown {
            if total_read >= countdown {
                return Err(DocumentError::InjectedReadError {
                    bytes_read: total_read,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Test-only hook: abort `read_file` once `bytes` bytes have been
    /// consumed from the stream, to verify the read is atomic.
    #[cfg(test)]
    pub fn set_injected_read_error_countdown(&mut self, bytes: usize) {
        self.injected_error_countdown = Some(bytes);
    }

    // ------------------------------------------------------------------
    // observers
    // ------------------------------------------------------------------

    pub fn add_observer(&mut self, observer: Box<dyn DocumentObserver>) -> ObserverId {
        let id = self.next_observer_id;
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        ObserverId(id)
    }

    pub fn remove_observer(&mut self, id: ObserverId) {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id.0);
        assert_eq!(
            self.observers.len(),
            before - 1,
            "remove_observer: id not registered"
        );
    }

    pub fn has_observer(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|(oid, _)| *oid == id.0)
    }

    /// Called by a History Engine (or any other saved-state tracker) when
    /// whether the document matches its last-saved state flips.
    pub fn notify_unsaved_changes_change(&mut self) {
        self.dispatch(|doc, obs| obs.observe_unsaved_changes_change(doc));
    }

    /// Deliver one notification to every observer, in registration order.
    /// Observers are moved out for the duration so that `&Document` can be
    /// handed to them without an aliasing conflict with the `&mut self`
    /// needed to hold the observer list; a panicking observer is caught
    /// here so it cannot take down an unrelated mutation.
    fn dispatch(&mut self, mut call: impl FnMut(&Document, &mut dyn DocumentObserver)) {
        let mut observers = std::mem::take(&mut self.observers);
        for (_, obs) in observers.iter_mut() {
            let obs_ref: &mut dyn DocumentObserver = obs.as_mut();
            let doc_ref: &Document = self;
            let _ = panic::catch_unwind(AssertUnwindSafe(|| call(doc_ref, obs_ref)));
        }
        self.observers = observers;
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            lines: (0..self.num_lines()).map(|l| self.get_whole_line(l)).collect(),
            longest_length_so_far: self.longest_length_so_far,
            version: self.version,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn is_space_or_tab(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// A deterministic, structural view of a document's contents, used for
/// snapshot-style assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub lines: Vec<Vec<u8>>,
    pub longest_length_so_far: usize,
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_from(s: &str) -> Document {
        let mut d = Document::new();
        d.replace_whole_file_string(s);
        d
    }

    #[test]
    fn fresh_document_has_one_empty_line() {
        let d = Document::new();
        assert_eq!(d.num_lines(), 1);
        assert!(d.is_empty_line(0));
    }

    #[test]
    fn scenario_a_insert_and_undo_by_hand() {
        let mut d = Document::new();
        d.insert_text(MCoord::new(0, 0), b"abcd");
        assert_eq!(d.get_whole_file(), b"abcd");
        d.delete_text_bytes(MCoord::new(0, 3), 1);
        d.delete_text_bytes(MCoord::new(0, 2), 1);
        d.delete_text_bytes(MCoord::new(0, 1), 1);
        d.delete_text_bytes(MCoord::new(0, 0), 1);
        assert_eq!(d.get_whole_file(), b"");
    }

    #[test]
    fn scenario_b_replace_multiline_range() {
        let mut d = doc_from("zero\none\ntwo\nthree");
        let range = MCoordRange::new(MCoord::new(1, 1), MCoord::new(2, 2));
        d.replace_multiline_range(range, b"XXXX\nYYYY");
        assert_eq!(d.get_whole_file_string(), "zero\noXXXX\nYYYYo\nthree");
    }

    #[test]
    fn scenario_e_walk_across_lines() {
        let d = doc_from("one\n\nthree\n");
        assert_eq!(d.num_lines(), 4);
        assert_eq!(d.walk_coord_bytes(MCoord::zero(), 4), Some(MCoord::new(1, 0)));
        assert_eq!(d.walk_coord_bytes(MCoord::zero(), 5), Some(MCoord::new(2, 0)));
        assert_eq!(d.walk_coord_bytes(MCoord::zero(), 11), Some(MCoord::new(3, 0)));
        assert_eq!(d.walk_coord_bytes(MCoord::zero(), 12), None);
    }

    #[test]
    fn walk_is_its_own_inverse() {
        let d = doc_from("abc\ndef\nghi");
        let start = MCoord::new(1, 1);
        let forward = d.walk_coord_bytes(start, 5).unwrap();
        let back = d.walk_coord_bytes(forward, -5).unwrap();
        assert_eq!(back, start);
    }

    #[test]
    fn insert_line_and_delete_line_roundtrip() {
        let mut d = Document::new();
        d.insert_line(1);
        assert_eq!(d.num_lines(), 2);
        d.delete_line(1);
        assert_eq!(d.num_lines(), 1);
    }

    #[test]
    #[should_panic(expected = "deleteLine requires an empty line")]
    fn delete_line_requires_empty() {
        let mut d = Document::new();
        d.insert_text(MCoord::new(0, 0), b"x");
        d.insert_line(1);
        d.delete_line(0);
    }

    #[test]
    fn num_lines_except_final_empty() {
        let d = doc_from("a\nb\n");
        // "a\nb\n" has a trailing separator semantics: lines() = ["a","b"]?
        // Our LF convention treats \n as separator, so "a\nb\n" means a final empty line.
        assert_eq!(d.num_lines(), 3);
        assert_eq!(d.num_lines_except_final_empty(), 2);
    }

    #[test]
    fn adjust_mcoord_clamps_out_of_range_coord_and_reports_change() {
        let d = doc_from("abc\nde");
        let (adjusted, changed) = d.adjust_mcoord(MCoord::new(5, 5));
        assert!(changed);
        assert_eq!(adjusted, MCoord::new(1, 2));
        assert!(d.valid_coord(adjusted));

        let (same, changed) = d.adjust_mcoord(MCoord::new(1, 2));
        assert!(!changed);
        assert_eq!(same, MCoord::new(1, 2));
    }

    #[test]
    fn adjust_mcoord_range_collapses_end_that_precedes_start_after_clamping() {
        // Mirrors the original's own ground-truth cases: endpoints are
        // clamped independently, never swapped, and a clamped `end` that
        // still precedes `start` collapses onto `start` instead of being
        // exchanged with it.
        let d = doc_from("ab\ncde");
        let (adjusted, changed) = d.adjust_mcoord_range(MCoordRange::new(
            MCoord::new(1, 2),
            MCoord::new(0, 0),
        ));
        assert!(changed);
        assert_eq!(adjusted, MCoordRange::new(MCoord::new(1, 2), MCoord::new(1, 2)));

        let (adjusted, changed) = d.adjust_mcoord_range(MCoordRange::new(
            MCoord::new(1, 9),
            MCoord::new(0, 0),
        ));
        assert!(changed);
        assert_eq!(adjusted, MCoordRange::new(MCoord::new(1, 3), MCoord::new(1, 3)));
    }

    #[test]
    fn adjust_mcoord_range_leaves_already_valid_ordered_range_unchanged() {
        let d = doc_from("abc\nde");
        let (adjusted, changed) = d.adjust_mcoord_range(MCoordRange::new(
            MCoord::new(0, 0),
            MCoord::new(1, 2),
        ));
        assert!(!changed);
        assert_eq!(adjusted, MCoordRange::new(MCoord::new(0, 0), MCoord::new(1, 2)));
    }

    #[test]
    fn version_strictly_increases_on_mutation() {
        let mut d = Document::new();
        let v0 = d.version();
        d.insert_text(MCoord::zero(), b"x");
        assert!(d.version() > v0);
    }

    #[test]
    fn recent_line_cache_roundtrips_content() {
        let mut d = Document::new();
        d.insert_text(MCoord::new(0, 0), b"hello");
        d.insert_line(1);
        d.insert_text(MCoord::new(1, 0), b"world");
        // Editing line 0 again should detach line 1 and reattach line 0.
        d.insert_text(MCoord::new(0, 5), b"!");
        assert_eq!(d.get_whole_line(0), b"hello!");
        assert_eq!(d.get_whole_line(1), b"world");
    }

    #[test]
    fn read_file_is_atomic_on_injected_error() {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello\nworld\nthis is long enough to span chunks")
            .unwrap();
        tmp.flush().unwrap();

        let mut d = doc_from("keep me");
        d.set_injected_read_error_countdown(5);
        let result = d.read_file(tmp.path());
        assert!(result.is_err());
        assert_eq!(d.get_whole_file_string(), "keep me");
    }

    #[test]
    fn read_file_then_write_file_roundtrips() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        tmp.write_all(b"zero\none\ntwo").unwrap();
        tmp.flush().unwrap();

        let mut d = Document::new();
        d.read_file(tmp.path()).unwrap();
        assert_eq!(d.get_whole_file_string(), "zero\none\ntwo");

        let out = tempfile::NamedTempFile::new().unwrap();
        d.write_file(out.path()).unwrap();
        assert_eq!(std::fs::read(out.path()).unwrap(), b"zero\none\ntwo");
    }
}
