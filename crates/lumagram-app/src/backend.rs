//! In-memory backend
//!
//! Implements the three collaborator interfaces the core consumes, backed
//! by plain maps. Stands in for the managed backend so the demo can run
//! without any network.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use lumagram_relations::{RelationError, RelationRecord, RelationRemote};
use lumagram_timeline::{Draft, FeedDataSource, Post, TimelineError};
use memory_blob_cache::{BlobError, BlobRemote};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

struct BackendState {
    /// Newest first.
    posts: Vec<Post>,
    likes: Vec<RelationRecord>,
    blobs: HashMap<String, Vec<u8>>,
}

pub struct MemoryBackend {
    state: Mutex<BackendState>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    /// Seed `count` posts by a handful of authors, plus a few likes and a
    /// dangling like from a deleted account on the newest post.
    pub fn seeded(count: usize) -> Self {
        let now = Utc::now();
        let authors = ["alice", "carol", "dave"];
        let mut posts = Vec::with_capacity(count);
        let mut blobs = HashMap::new();
        for i in 0..count {
            let content_key = format!("img-{}.jpg", i);
            blobs.insert(content_key.clone(), format!("jpeg bytes {}", i).into_bytes());
            posts.push(Post {
                id: format!("post-{}", i),
                author_id: authors[i % authors.len()].to_string(),
                created_at: now - ChronoDuration::minutes(i as i64),
                content_key,
            });
        }

        let mut likes = Vec::new();
        if let Some(newest) = posts.first() {
            likes.push(RelationRecord {
                entity_id: newest.id.clone(),
                actor_id: Some("carol".to_string()),
                created_at: now,
            });
            likes.push(RelationRecord {
                entity_id: newest.id.clone(),
                actor_id: None,
                created_at: now,
            });
        }

        Self {
            state: Mutex::new(BackendState { posts, likes, blobs }),
            next_id: AtomicU64::new(count as u64),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FeedDataSource for MemoryBackend {
    async fn fetch_range(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>, TimelineError> {
        let state = self.lock();
        let end = (offset + limit).min(state.posts.len());
        let start = offset.min(end);
        Ok(state.posts[start..end].to_vec())
    }

    async fn publish(&self, draft: Draft) -> Result<Post, TimelineError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let content_key = format!("img-{}.jpg", id);
        let post = Post {
            id: format!("post-{}", id),
            author_id: draft.author_id,
            created_at: Utc::now(),
            content_key: content_key.clone(),
        };
        let mut state = self.lock();
        state.blobs.insert(content_key, draft.image);
        state.posts.insert(0, post.clone());
        Ok(post)
    }
}

#[async_trait]
impl RelationRemote for MemoryBackend {
    async fn fetch_relations(
        &self,
        entity_id: &str,
    ) -> Result<Vec<RelationRecord>, RelationError> {
        let state = self.lock();
        Ok(state
            .likes
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn add_relation(&self, entity_id: &str, actor_id: &str) -> Result<(), RelationError> {
        self.lock().likes.push(RelationRecord {
            entity_id: entity_id.to_string(),
            actor_id: Some(actor_id.to_string()),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove_relation(&self, entity_id: &str, actor_id: &str) -> Result<(), RelationError> {
        // Removes every matching record, duplicates included.
        self.lock().likes.retain(|r| {
            !(r.entity_id == entity_id && r.actor_id.as_deref() == Some(actor_id))
        });
        Ok(())
    }
}

#[async_trait]
impl BlobRemote for MemoryBackend {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, BlobError> {
        self.lock()
            .blobs
            .get(locator)
            .cloned()
            .ok_or_else(|| BlobError::Remote(format!("no blob stored for {}", locator)))
    }
}
