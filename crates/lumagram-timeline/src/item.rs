//! Feed item glue
//!
//! One timeline entry: the post itself, a handle to the process-wide blob
//! cache for its image, and its own relation store for likes. Both sides
//! populate lazily, on first display.

use crate::types::Post;
use lumagram_relations::{RelationRemote, RelationStore};
use memory_blob_cache::{BlobCache, BlobRemote};
use std::sync::Arc;

pub struct FeedItem {
    post: Post,
    likes: RelationStore,
    cache: Arc<BlobCache>,
}

impl FeedItem {
    pub fn new(post: Post, cache: Arc<BlobCache>) -> Self {
        let likes = RelationStore::new(post.id.clone());
        Self { post, likes, cache }
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    /// The likers of this post; unfetched until `fetch_likes` runs.
    pub fn likes(&self) -> &RelationStore {
        &self.likes
    }

    /// Cached image payload, if the blob has already been fetched.
    pub fn image(&self) -> Option<Arc<Vec<u8>>> {
        self.cache.get(&self.post.content_key)
    }

    /// Fetch the image through the shared cache. Posts referencing the same
    /// content key share one cached payload and one in-flight fetch.
    pub async fn load_image(
        &self,
        remote: &dyn BlobRemote,
    ) -> memory_blob_cache::Result<Arc<Vec<u8>>> {
        self.cache
            .fetch_and_cache(&self.post.content_key, &self.post.content_key, remote)
            .await
    }

    /// Populate the liker set, once.
    pub async fn fetch_likes(&self, remote: &dyn RelationRemote) -> lumagram_relations::Result<()> {
        self.likes.fetch_if_needed(remote).await
    }

    pub fn liked_by(&self, actor_id: &str) -> bool {
        self.likes.contains(actor_id)
    }

    /// Optimistically flip `actor_id`'s like on this post.
    pub async fn toggle_like(
        &self,
        remote: &dyn RelationRemote,
        actor_id: &str,
    ) -> lumagram_relations::Result<bool> {
        self.likes.toggle(remote, actor_id).await
    }
}
