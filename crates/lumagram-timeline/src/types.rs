//! Feed entity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable feed post. `id` and `content_key` are assigned by the backend
/// when a draft is published; neither changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    /// Sole sort key; the data source returns pages in descending order.
    pub created_at: DateTime<Utc>,
    /// Stable identifier of the binary payload, shared across posts that
    /// reference the same content.
    pub content_key: String,
}

/// A post being composed client-side. Transient: it has no identity until
/// the data source stores it and returns the durable `Post`.
#[derive(Debug, Clone)]
pub struct Draft {
    pub author_id: String,
    pub image: Vec<u8>,
}

/// Engine state changes a display layer can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    PageLoaded { offset: usize, count: usize },
    /// A page came back short; no further fetches this session.
    EndOfData,
    LoadFailed { offset: usize, error: String },
    Reset,
    Published { id: String },
}
