//! The Document Core: a line-structured text buffer with a recent-line
//! edit cache and an observer protocol for keeping derived structures
//! (history, search) in sync.

pub mod core;
pub mod observer;

pub use core::{Document, DocumentSnapshot};
pub use observer::{DocumentObserver, ObserverId};
