//! The observer protocol: a registered party is told about every mutation
//! right after the document has finished making it, so it can keep a
//! derived structure (a search index, a minimap, a highlighter) in sync
//! without re-scanning the whole document each time.
//!
//! Implementations must not panic. The document dispatches notifications
//! inside `catch_unwind` as a last line of defense (mirroring the
//! original's `NOEXCEPT` observer methods, which simply cannot fail as far
//! as the document is concerned), but a panicking observer still loses its
//! own state and should be considered a bug in the observer, not something
//! to design around.

use super::core::Document;
use crate::coord::MCoord;

#[allow(unused_variables)]
pub trait DocumentObserver {
    fn observe_insert_line(&mut self, doc: &Document, line: usize) {}
    fn observe_delete_line(&mut self, doc: &Document, line: usize) {}
    fn observe_insert_text(&mut self, doc: &Document, coord: MCoord, bytes: &[u8]) {}
    fn observe_delete_text(&mut self, doc: &Document, coord: MCoord, length_bytes: usize) {}
    /// The document was replaced wholesale (a `swap_with` from `read_file`,
    /// or a whole-file replace) -- any incremental bookkeeping should be
    /// rebuilt from scratch instead of trying to interpret it as a sequence
    /// of line/text edits.
    fn observe_total_change(&mut self, doc: &Document) {}
    fn observe_unsaved_changes_change(&mut self, doc: &Document) {}
}

/// A handle returned by [`Document::add_observer`], used to remove that
/// observer later. Observer identity in this crate is this id, not
/// pointer/object equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(super) u64);
