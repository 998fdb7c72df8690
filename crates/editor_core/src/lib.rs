//! Editable text document core: the in-memory representation of a file as
//! a sequence of lines, with efficient localized edits, an observer
//! notification protocol, an invertible undo/redo engine, and an
//! incremental search index that tracks the document.
//!
//! This crate is the component a full editor UI is built on. It does not
//! do any GUI painting, font rendering, or syntax highlighting; those are
//! external collaborators that consume the document, not part of it. It
//! also does not know about cursors or selections -- callers that want
//! those overlay them on top of the byte-offset [`coord::MCoord`]s this
//! crate already works in.
//!
//! - [`gap`] -- the generic gap-array sequence the document is built from.
//! - [`coord`] -- byte-precise coordinates and ranges into a document.
//! - [`doc`] -- the Document Core itself: lines, the recent-line cache,
//!   and the observer protocol.
//! - [`history`] -- invertible edit records and the undo/redo engine.
//! - [`search`] -- the incremental per-line search index.
//! - [`rle`] -- run-length-encoded infinite sequences, used to describe
//!   sparse per-line overlays such as highlighting categories.
//! - [`error`] -- error types shared across the crate.

pub mod coord;
pub mod doc;
pub mod error;
pub mod gap;
pub mod history;
pub mod rle;
pub mod search;

pub use coord::{MCoord, MCoordRange};
pub use doc::{Document, DocumentObserver, DocumentSnapshot, ObserverId};
pub use error::{DocumentError, DocumentResult};
pub use history::{HistoryElement, HistoryEngine, HistoryStats};
pub use search::{MatchExtent, SearchFlags, SearchIndex};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_document_has_one_empty_line() {
        let doc = Document::new();
        assert_eq!(doc.num_lines(), 1);
    }

    /// End-to-end smoke test wiring a `HistoryEngine` and a `SearchIndex`
    /// together the way a higher-level editor would: edits go through the
    /// history engine, and the search index is recomputed by hand against
    /// it (see the Open Question in DESIGN.md on why `SearchIndex` borrows
    /// the document per call instead of self-registering as an observer).
    #[test]
    fn history_and_search_stay_consistent_across_an_edit() {
        let mut engine = HistoryEngine::new(Document::new());
        engine.insert_text(MCoord::zero(), b"one two");

        let mut index = SearchIndex::new(engine.document());
        index.set_search_string(engine.document(), "o");
        assert_eq!(index.count_all_matches(), 2);

        engine.insert_text(MCoord::new(0, 7), b" one");
        index.recompute_all(engine.document());
        assert_eq!(index.count_all_matches(), 3);

        engine.undo().unwrap();
        index.recompute_all(engine.document());
        assert_eq!(index.count_all_matches(), 2);
    }
}
