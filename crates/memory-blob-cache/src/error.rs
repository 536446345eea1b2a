//! Error types for the blob cache

use std::fmt;

/// Errors surfaced by blob fetches.
///
/// `Clone` so a single failure can be fanned out to every caller parked on
/// the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The remote fetch failed; carries the remote's error message.
    Remote(String),
    /// The fetch leading this key was dropped before producing a result.
    Aborted,
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::Remote(msg) => write!(f, "blob fetch failed: {}", msg),
            BlobError::Aborted => write!(f, "blob fetch aborted"),
        }
    }
}

impl std::error::Error for BlobError {}

pub type Result<T> = std::result::Result<T, BlobError>;
