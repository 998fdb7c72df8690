//! Error types for the document core.
//!
//! Most invalid usage (a bad [`crate::coord::MCoord`], deleting a non-empty
//! line, rolling back a rollback) is treated as a programming error and
//! reported with `assert!`/`panic!`, not a `Result` -- there is nothing a
//! caller can sensibly recover from in those cases. [`DocumentError`] is
//! reserved for failures that are expected to happen during normal use:
//! a corrupt/mismatched undo record, or I/O trouble while reading or
//! writing a file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    /// Replaying (or reversing) a recorded edit found that the document's
    /// current contents don't match what the edit expects to see. This
    /// means the undo/redo log and the live document have diverged; the
    /// caller should treat the document as unmodified by the failed
    /// operation (group application rolls back any partial effect before
    /// this error escapes).
    #[error("history mismatch: {0}")]
    HistoryMismatch(String),

    /// A file read was deliberately aborted partway through, used to test
    /// that `read_file` leaves the target document untouched on failure.
    /// Only ever raised when a test has armed the countdown via
    /// `Document::set_injected_read_error_countdown`; inert in production.
    #[error("injected read error after {bytes_read} bytes")]
    InjectedReadError { bytes_read: usize },
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors from whole-file I/O, where the underlying cause (file not found,
/// permission denied, ...) is worth preserving for the caller.
pub type IoResult<T> = anyhow::Result<T>;
