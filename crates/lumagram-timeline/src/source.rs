//! Timeline data source interface

use crate::error::Result;
use crate::types::{Draft, Post};
use async_trait::async_trait;

/// Backend supplying ordered pages of the current user's timeline.
///
/// Implementations query whatever store holds the posts; the engine only
/// relies on the ordering and truncation contract below.
#[async_trait]
pub trait FeedDataSource: Send + Sync {
    /// Up to `limit` posts starting at `offset`, ordered by `created_at`
    /// descending. Returning fewer than `limit` posts signals end-of-data.
    async fn fetch_range(&self, offset: usize, limit: usize) -> Result<Vec<Post>>;

    /// Store a draft's payload and the post itself, returning the durable
    /// post with its assigned `id` and `content_key`.
    async fn publish(&self, draft: Draft) -> Result<Post>;
}
