//! Lumagram demo driver
//!
//! Wires the timeline engine, relation stores, and blob cache to an
//! in-memory backend and walks through a full session: initial load,
//! scroll-driven pagination to end-of-data, image loading, like toggling,
//! publishing a new post, and a refresh.

mod backend;
mod config;

use crate::backend::MemoryBackend;
use crate::config::Config;
use lumagram_timeline::{Draft, TimelineConfig, TimelineEngine, TimelineEvent};
use memory_blob_cache::BlobCache;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CURRENT_USER: &str = "bob";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("lumagram_app=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting Lumagram demo...");

    let config = Config::from_env();
    info!("Page size: {}", config.page_size);
    info!("Load threshold: {}", config.load_threshold);
    info!("Cache capacity: {} bytes", config.cache_bytes);
    info!("Seed posts: {}", config.seed_posts);

    let backend = Arc::new(MemoryBackend::seeded(config.seed_posts));
    let cache = Arc::new(BlobCache::new(config.cache_bytes));
    let engine = TimelineEngine::new(
        backend.clone(),
        cache.clone(),
        TimelineConfig {
            initial_page_size: config.page_size,
            page_size: config.page_size,
            load_threshold: config.load_threshold,
            fetch_timeout: config.fetch_timeout,
        },
    );

    let _sub = engine.subscribe(|event: &TimelineEvent| match event {
        TimelineEvent::PageLoaded { offset, count } => {
            info!(offset, count, "page loaded");
        }
        TimelineEvent::EndOfData => info!("end of data"),
        TimelineEvent::LoadFailed { offset, error } => info!(offset, error = %error, "load failed"),
        TimelineEvent::Reset => info!("timeline reset"),
        TimelineEvent::Published { id } => info!(id = %id, "post published"),
    });

    // Initial load, then scroll until the feed is exhausted.
    engine.load_initial_if_required().await?;
    let mut index = 0;
    while index < engine.len() {
        engine.will_display_entry(index).await?;
        index += 1;
    }
    info!("Scrolled through {} posts", engine.len());

    // Display the newest post: image and likes populate lazily.
    if let Some(item) = engine.item(0) {
        let image = item.load_image(&*backend).await?;
        item.fetch_likes(&*backend).await?;
        info!(
            id = %item.post().id,
            image_bytes = image.len(),
            likers = item.likes().members().map(|m| m.len()).unwrap_or(0),
            "displayed newest post"
        );

        // Like it, then change our mind.
        let liked = item.toggle_like(&*backend, CURRENT_USER).await?;
        info!(liked, "toggled like");
        let liked = item.toggle_like(&*backend, CURRENT_USER).await?;
        info!(liked, "toggled like again");
    }

    // Publish a new post and refresh to see it at the top.
    let post = engine
        .publish(Draft {
            author_id: CURRENT_USER.to_string(),
            image: b"fresh jpeg bytes".to_vec(),
        })
        .await?;
    engine.reset();
    engine.load_initial_if_required().await?;
    let newest = engine.item(0).map(|item| item.post().id.clone());
    info!(published = %post.id, newest = ?newest, "after refresh");

    let stats = cache.stats();
    info!(
        entries = stats.entries,
        total_size = stats.total_size,
        hits = stats.hits,
        misses = stats.misses,
        "blob cache stats"
    );

    Ok(())
}
