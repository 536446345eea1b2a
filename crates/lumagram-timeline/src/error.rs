//! Error types for the timeline engine

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// A range fetch against the data source failed.
    Fetch(String),
    /// Publishing a draft failed.
    Publish(String),
    /// A range fetch exceeded the configured timeout.
    Timeout,
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::Fetch(msg) => write!(f, "timeline fetch failed: {}", msg),
            TimelineError::Publish(msg) => write!(f, "publish failed: {}", msg),
            TimelineError::Timeout => write!(f, "timeline fetch timed out"),
        }
    }
}

impl std::error::Error for TimelineError {}

pub type Result<T> = std::result::Result<T, TimelineError>;
