//! Error types for relation operations

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationError {
    /// Fetching the relation records for an entity failed.
    Fetch(String),
    /// An add or remove call failed; the local toggle has been reverted.
    Mutation(String),
}

impl fmt::Display for RelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationError::Fetch(msg) => write!(f, "relation fetch failed: {}", msg),
            RelationError::Mutation(msg) => write!(f, "relation mutation failed: {}", msg),
        }
    }
}

impl std::error::Error for RelationError {}

pub type Result<T> = std::result::Result<T, RelationError>;
