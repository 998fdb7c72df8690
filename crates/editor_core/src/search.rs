//! Incremental per-line search index.
//!
//! A [`SearchIndex`] keeps a match list for every line of a [`Document`] up
//! to date as the document changes, rather than rescanning the whole
//! document on every query. It implements [`DocumentObserver`] so it can be
//! registered directly with a document (or a [`crate::history::HistoryEngine`]),
//! or driven by hand-calling the `observe_*` methods.

use regex::bytes::{Regex, RegexBuilder};

use crate::coord::{MCoord, MCoordRange};
use crate::doc::core::Document;
use crate::doc::observer::DocumentObserver;

/// How to interpret the search string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchFlags {
    pub case_insensitive: bool,
    pub regex: bool,
}

impl SearchFlags {
    pub const NONE: SearchFlags = SearchFlags {
        case_insensitive: false,
        regex: false,
    };
}

/// A single hit within one line: a byte offset and a byte length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchExtent {
    pub start_byte: usize,
    pub length_bytes: usize,
}

impl MatchExtent {
    pub fn new(start_byte: usize, length_bytes: usize) -> Self {
        MatchExtent {
            start_byte,
            length_bytes,
        }
    }
}

pub struct SearchIndex {
    search_string: String,
    flags: SearchFlags,
    regex: Option<Regex>,
    regex_error: Option<String>,
    /// One entry per document line.
    matches: Vec<Vec<MatchExtent>>,
    match_count_limit: usize,
    incomplete: bool,
}

impl SearchIndex {
    pub fn new(doc: &Document) -> Self {
        SearchIndex {
            search_string: String::new(),
            flags: SearchFlags::NONE,
            regex: None,
            regex_error: None,
            matches: vec![Vec::new(); doc.num_lines()],
            match_count_limit: 1000,
            incomplete: false,
        }
    }

    pub fn search_string(&self) -> &str {
        &self.search_string
    }

    pub fn has_search_string(&self) -> bool {
        !self.search_string.is_empty()
    }

    pub fn flags(&self) -> SearchFlags {
        self.flags
    }

    pub fn document_lines(&self) -> usize {
        self.matches.len()
    }

    pub fn set_search_string(&mut self, doc: &Document, s: &str) {
        self.search_string = s.to_string();
        self.recompile_and_recompute(doc);
    }

    pub fn set_search_flags(&mut self, doc: &Document, flags: SearchFlags) {
        self.flags = flags;
        self.recompile_and_recompute(doc);
    }

    pub fn set_search_string_and_flags(&mut self, doc: &Document, s: &str, flags: SearchFlags) {
        self.search_string = s.to_string();
        self.flags = flags;
        self.recompile_and_recompute(doc);
    }

    pub fn set_match_count_limit(&mut self, doc: &Document, limit: usize) {
        self.match_count_limit = limit;
        self.recompute_all(doc);
    }

    pub fn match_count_limit(&self) -> usize {
        self.match_count_limit
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    /// False only when regex mode is on and the pattern fails to compile.
    /// An empty search string is always considered valid, but matches
    /// nothing.
    pub fn is_valid(&self) -> bool {
        !(self.flags.regex && !self.search_string.is_empty() && self.regex.is_none())
    }

    pub fn syntax_error(&self) -> Option<&str> {
        self.regex_error.as_deref()
    }

    fn recompile_and_recompute(&mut self, doc: &Document) {
        self.regex = None;
        self.regex_error = None;
        if self.flags.regex && !self.search_string.is_empty() {
            match RegexBuilder::new(&self.search_string)
                .case_insensitive(self.flags.case_insensitive)
                .build()
            {
                Ok(re) => self.regex = Some(re),
                Err(e) => self.regex_error = Some(e.to_string()),
            }
        }
        self.recompute_all(doc);
    }

    /// Recompute every line's matches from scratch, respecting the match
    /// count limit: once the running total across lines exceeds it, the
    /// remaining lines are left empty and `is_incomplete()` becomes true.
    /// Lines already scanned keep their matches even when the limit is hit
    /// partway through a later line.
    pub fn recompute_all(&mut self, doc: &Document) {
        let n = doc.num_lines();
        self.matches.resize(n, Vec::new());
        self.incomplete = false;
        let mut total = 0usize;
        for line in 0..n {
            if self.incomplete {
                self.set_line_matches(line, Vec::new());
                continue;
            }
            let computed = self.compute_line_matches(doc, line);
            total += computed.len();
            if total > self.match_count_limit {
                self.incomplete = true;
                self.set_line_matches(line, Vec::new());
            } else {
                self.set_line_matches(line, computed);
            }
        }
    }

    fn recompute_line(&mut self, doc: &Document, line: usize) {
        if line >= self.matches.len() {
            return;
        }
        let computed = self.compute_line_matches(doc, line);
        self.set_line_matches(line, computed);
        let total: usize = self.matches.iter().map(Vec::len).sum();
        self.incomplete = total > self.match_count_limit;
    }

    /// Replace a line's match list only if it actually differs, so live
    /// typing that doesn't change the match set doesn't churn the
    /// allocator.
    fn set_line_matches(&mut self, line: usize, new_matches: Vec<MatchExtent>) {
        if self.matches[line] != new_matches {
            self.matches[line] = new_matches;
        }
    }

    fn compute_line_matches(&self, doc: &Document, line: usize) -> Vec<MatchExtent> {
        if self.search_string.is_empty() {
            return Vec::new();
        }
        let bytes = doc.get_whole_line(line);
        if self.flags.regex {
            match &self.regex {
                Some(re) => re
                    .find_iter(&bytes)
                    .map(|m| MatchExtent::new(m.start(), m.end() - m.start()))
                    .collect(),
                None => Vec::new(),
            }
        } else {
            literal_matches(&bytes, self.search_string.as_bytes(), self.flags.case_insensitive)
        }
    }

    // ------------------------------------------------------------------
    // navigation queries
    // ------------------------------------------------------------------

    pub fn count_line_matches(&self, line: usize) -> usize {
        self.matches.get(line).map_or(0, Vec::len)
    }

    pub fn count_range_matches(&self, start_line: usize, end_line_plus_one: usize) -> usize {
        let end = end_line_plus_one.min(self.matches.len());
        (start_line..end).map(|l| self.count_line_matches(l)).sum()
    }

    pub fn count_all_matches(&self) -> usize {
        self.count_range_matches(0, self.matches.len())
    }

    pub fn get_line_matches(&self, line: usize) -> &[MatchExtent] {
        assert!(
            self.count_line_matches(line) > 0,
            "get_line_matches: line {line} has no matches"
        );
        &self.matches[line]
    }

    /// True if a match exists whose `(start, length)` equals the rectified
    /// `a..b`. Matches never span lines, so a cross-line `a..b` is never a
    /// match.
    pub fn range_is_match(&self, a: MCoord, b: MCoord) -> bool {
        let range = MCoordRange::new(a, b).rectified();
        if range.start.line != range.end.line {
            return false;
        }
        let len = range.end.byte - range.start.byte;
        self.matches
            .get(range.start.line)
            .map(|ms| ms.iter().any(|m| m.start_byte == range.start.byte && m.length_bytes == len))
            .unwrap_or(false)
    }

    /// The next match in the direction of travel, rectifying `range` first.
    /// No wraparound: once traversal walks off either end of the document,
    /// returns `None`.
    ///
    /// A range that only partially covers a match -- its start coincides
    /// with the match but its end falls short of it (forward), or its end
    /// coincides with the match but its start falls short of it (reverse)
    /// -- expands to that same match rather than advancing past it. A
    /// range that covers a match exactly, or overruns it, advances to the
    /// next one. This mirrors a selection growing to fill a match it has
    /// only partly selected, then jumping onward once the whole match is
    /// selected.
    pub fn next_match(&self, range: MCoordRange, reverse: bool) -> Option<MCoordRange> {
        let range = range.rectified();
        if !reverse {
            if let Some(found) = self.forward_match_on_line(range.start.line, range) {
                return Some(found);
            }
            for line in (range.start.line + 1)..self.matches.len() {
                if let Some(m) = self.matches[line].first() {
                    return Some(self.extent_range(line, m));
                }
            }
            None
        } else {
            if let Some(found) = self.reverse_match_on_line(range.end.line, range) {
                return Some(found);
            }
            let upper = range.end.line.min(self.matches.len());
            for line in (0..upper).rev() {
                if let Some(m) = self.matches[line].last() {
                    return Some(self.extent_range(line, m));
                }
            }
            None
        }
    }

    /// Scans `line`'s matches in ascending order for the first one `range`
    /// hasn't already fully passed, per the expand-then-advance rule
    /// documented on [`Self::next_match`].
    fn forward_match_on_line(&self, line: usize, range: MCoordRange) -> Option<MCoordRange> {
        let ms = self.matches.get(line)?;
        for m in ms {
            let match_end = m.start_byte + m.length_bytes;
            if range.start.byte < m.start_byte {
                return Some(self.extent_range(line, m));
            }
            if range.start.byte == m.start_byte && range.end.byte < match_end {
                return Some(self.extent_range(line, m));
            }
        }
        None
    }

    /// Mirror image of [`Self::forward_match_on_line`]: scans `line`'s
    /// matches in descending order for the first one `range` hasn't
    /// already fully passed, walking backward.
    fn reverse_match_on_line(&self, line: usize, range: MCoordRange) -> Option<MCoordRange> {
        let ms = self.matches.get(line)?;
        for m in ms.iter().rev() {
            let match_start = m.start_byte;
            let match_end = m.start_byte + m.length_bytes;
            if range.end.byte <= match_start {
                continue;
            }
            if range.end.byte == match_end {
                if range.start.byte > match_start {
                    return Some(self.extent_range(line, m));
                }
                continue;
            }
            // range.end is past match_start and isn't exactly match_end,
            // i.e. it's either strictly inside the match or past its end.
            if range.start.byte >= match_start {
                return Some(self.extent_range(line, m));
            }
        }
        None
    }

    fn extent_range(&self, line: usize, m: &MatchExtent) -> MCoordRange {
        MCoordRange::new(
            MCoord::new(line, m.start_byte),
            MCoord::new(line, m.start_byte + m.length_bytes),
        )
    }
}

/// Naive literal scan. On a match at offset `o` of length `l`, the scan
/// resumes at `o + l + 1` rather than `o + l`, so that e.g. searching for
/// "aa" in "aaaa" yields matches at 0 and 2 -- not 0, 1, 2 -- keeping
/// adjacent hits from visually fusing together.
fn literal_matches(haystack: &[u8], needle: &[u8], case_insensitive: bool) -> Vec<MatchExtent> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + needle.len() <= haystack.len() {
        let window = &haystack[i..i + needle.len()];
        let is_match = if case_insensitive {
            window.eq_ignore_ascii_case(needle)
        } else {
            window == needle
        };
        if is_match {
            out.push(MatchExtent::new(i, needle.len()));
            i += needle.len() + 1;
        } else {
            i += 1;
        }
    }
    out
}

impl DocumentObserver for SearchIndex {
    fn observe_insert_line(&mut self, _doc: &Document, line: usize) {
        self.matches.insert(line.min(self.matches.len()), Vec::new());
    }

    fn observe_delete_line(&mut self, _doc: &Document, line: usize) {
        if line < self.matches.len() {
            self.matches.remove(line);
        }
    }

    fn observe_insert_text(&mut self, doc: &Document, coord: MCoord, _bytes: &[u8]) {
        self.recompute_line(doc, coord.line);
    }

    fn observe_delete_text(&mut self, doc: &Document, coord: MCoord, _length_bytes: usize) {
        self.recompute_line(doc, coord.line);
    }

    fn observe_total_change(&mut self, doc: &Document) {
        self.recompute_all(doc);
    }
}
