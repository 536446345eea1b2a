//! Scroll-driven pagination engine
//!
//! The engine owns an append-only list of feed items and issues one range
//! fetch at a time against the data source. The display layer reports each
//! item as it becomes visible; nearing the loaded end triggers the next
//! page. A short page marks end-of-data for the session; `reset` starts a
//! fresh one.

use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::item::FeedItem;
use crate::source::FeedDataSource;
use crate::types::{Draft, Post, TimelineEvent};
use lumagram_events::{EventBus, Subscription};
use memory_blob_cache::BlobCache;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, info};

struct EngineState {
    items: Vec<Arc<FeedItem>>,
    /// End of the half-open loaded range `[0, loaded_end)`.
    loaded_end: usize,
    is_loading: bool,
    initial_load_completed: bool,
    end_of_data: bool,
    /// Bumped by `reset`; a fetch started under an older generation is
    /// discarded when it resolves.
    generation: u64,
}

pub struct TimelineEngine {
    source: Arc<dyn FeedDataSource>,
    cache: Arc<BlobCache>,
    config: TimelineConfig,
    state: Mutex<EngineState>,
    events: EventBus<TimelineEvent>,
}

impl TimelineEngine {
    pub fn new(
        source: Arc<dyn FeedDataSource>,
        cache: Arc<BlobCache>,
        config: TimelineConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
            state: Mutex::new(EngineState {
                items: Vec::new(),
                loaded_end: 0,
                is_loading: false,
                initial_load_completed: false,
                end_of_data: false,
                generation: 0,
            }),
            events: EventBus::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription<TimelineEvent>
    where
        F: Fn(&TimelineEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    /// Snapshot of the loaded items, in data-source order.
    pub fn items(&self) -> Vec<Arc<FeedItem>> {
        self.lock().items.clone()
    }

    pub fn item(&self, index: usize) -> Option<Arc<FeedItem>> {
        self.lock().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    /// `false` once a short page has marked this session's end-of-data.
    pub fn has_more(&self) -> bool {
        !self.lock().end_of_data
    }

    /// Issue the first page fetch, once.
    ///
    /// The guard flag is set before the fetch resolves, so N rapid
    /// invocations (a view appearing repeatedly) issue exactly one fetch.
    /// A failed initial load clears the flag again: an empty timeline has
    /// no visible items to retrigger loading, so the next invocation must
    /// be allowed to retry.
    pub async fn load_initial_if_required(&self) -> Result<()> {
        let generation = {
            let mut state = self.lock();
            if state.initial_load_completed {
                return Ok(());
            }
            state.initial_load_completed = true;
            state.is_loading = true;
            state.generation
        };

        match self.fetch_page(generation, 0, self.config.initial_page_size).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut state = self.lock();
                if state.generation == generation {
                    state.initial_load_completed = false;
                }
                Err(e)
            }
        }
    }

    /// Report that the item at `index` is about to be displayed.
    ///
    /// Fetches the next page when `index` falls within the configured
    /// trailing margin of the loaded end. A no-op while a fetch is in
    /// flight (fetches are strictly serialized), after end-of-data, and
    /// before the initial load.
    pub async fn will_display_entry(&self, index: usize) -> Result<()> {
        let (generation, offset) = {
            let mut state = self.lock();
            if state.is_loading || state.end_of_data || !state.initial_load_completed {
                return Ok(());
            }
            if index + self.config.load_threshold < state.items.len() {
                return Ok(());
            }
            state.is_loading = true;
            (state.generation, state.loaded_end)
        };

        self.fetch_page(generation, offset, self.config.page_size).await
    }

    /// Publish a draft through the data source. The durable post is not
    /// inserted into the loaded list; callers `reset` and reload to see it
    /// in timeline order.
    pub async fn publish(&self, draft: Draft) -> Result<Post> {
        let post = self.source.publish(draft).await.map_err(|e| {
            error!(error = %e, "publish failed");
            e
        })?;
        info!(id = %post.id, "post published");
        self.events.emit(&TimelineEvent::Published {
            id: post.id.clone(),
        });
        Ok(post)
    }

    /// Drop all loaded state and start a fresh session (pull-to-refresh).
    /// A fetch in flight when this runs is discarded when it resolves.
    pub fn reset(&self) {
        {
            let mut state = self.lock();
            state.items.clear();
            state.loaded_end = 0;
            state.is_loading = false;
            state.initial_load_completed = false;
            state.end_of_data = false;
            state.generation += 1;
        }
        self.events.emit(&TimelineEvent::Reset);
    }

    async fn fetch_page(&self, generation: u64, offset: usize, limit: usize) -> Result<()> {
        debug!(offset, limit, "fetching timeline page");

        let fetched = match timeout(
            self.config.fetch_timeout,
            self.source.fetch_range(offset, limit),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TimelineError::Timeout),
        };

        match fetched {
            Ok(posts) => {
                let (event, ended) = {
                    let mut guard = self.lock();
                    let state = &mut *guard;
                    if state.generation != generation {
                        debug!(offset, "discarding page fetched before reset");
                        return Ok(());
                    }
                    state.is_loading = false;
                    let count = posts.len();
                    let ended = count < limit;
                    for post in posts {
                        state
                            .items
                            .push(Arc::new(FeedItem::new(post, self.cache.clone())));
                    }
                    state.loaded_end = state.items.len();
                    if ended {
                        state.end_of_data = true;
                    }
                    (TimelineEvent::PageLoaded { offset, count }, ended)
                };
                self.events.emit(&event);
                if ended {
                    debug!(offset, "timeline end of data");
                    self.events.emit(&TimelineEvent::EndOfData);
                }
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    if state.generation != generation {
                        debug!(offset, "discarding failure from before reset");
                        return Ok(());
                    }
                    state.is_loading = false;
                }
                error!(offset, limit, error = %e, "timeline page fetch failed");
                self.events.emit(&TimelineEvent::LoadFailed {
                    offset,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FakeSource {
        posts: Vec<Post>,
        fetches: AtomicUsize,
        ranges: Mutex<Vec<(usize, usize)>>,
        fail: bool,
        gate: Option<Arc<Notify>>,
        hang: bool,
    }

    impl FakeSource {
        fn with_posts(count: usize) -> Self {
            // Newest first, matching the data source ordering contract.
            let now = Utc::now();
            let posts = (0..count)
                .map(|i| Post {
                    id: format!("post-{}", i),
                    author_id: "alice".to_string(),
                    created_at: now - ChronoDuration::seconds(i as i64),
                    content_key: format!("img-{}.jpg", i),
                })
                .collect();
            Self {
                posts,
                fetches: AtomicUsize::new(0),
                ranges: Mutex::new(Vec::new()),
                fail: false,
                gate: None,
                hang: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::with_posts(0)
            }
        }

        fn gated(count: usize, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::with_posts(count)
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::with_posts(0)
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedDataSource for FakeSource {
        async fn fetch_range(&self, offset: usize, limit: usize) -> Result<Vec<Post>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.ranges.lock().unwrap().push((offset, limit));
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(TimelineError::Fetch("backend offline".to_string()));
            }
            let end = (offset + limit).min(self.posts.len());
            let start = offset.min(end);
            Ok(self.posts[start..end].to_vec())
        }

        async fn publish(&self, draft: Draft) -> Result<Post> {
            Ok(Post {
                id: "post-new".to_string(),
                author_id: draft.author_id,
                created_at: Utc::now(),
                content_key: "img-new.jpg".to_string(),
            })
        }
    }

    fn engine_with(source: Arc<FakeSource>, config: TimelineConfig) -> TimelineEngine {
        TimelineEngine::new(source, Arc::new(BlobCache::new(1024 * 1024)), config)
    }

    #[tokio::test]
    async fn test_initial_load_fetches_first_page() {
        let source = Arc::new(FakeSource::with_posts(12));
        let engine = engine_with(source.clone(), TimelineConfig::default());

        engine.load_initial_if_required().await.unwrap();

        assert_eq!(engine.len(), 5);
        assert_eq!(*source.ranges.lock().unwrap(), vec![(0, 5)]);
        assert!(!engine.is_loading());
        assert!(engine.has_more());
    }

    #[tokio::test]
    async fn test_initial_load_is_issued_once_despite_rapid_calls() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(12, gate.clone()));
        let engine = Arc::new(engine_with(source.clone(), TimelineConfig::default()));

        let e = engine.clone();
        let first = tokio::spawn(async move { e.load_initial_if_required().await });
        tokio::task::yield_now().await;

        // Guard flag is set before the first fetch resolves.
        engine.load_initial_if_required().await.unwrap();
        engine.load_initial_if_required().await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        gate.notify_waiters();
        first.await.unwrap().unwrap();
        assert_eq!(engine.len(), 5);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_content_preserves_data_source_order() {
        let source = Arc::new(FakeSource::with_posts(2));
        let engine = engine_with(source.clone(), TimelineConfig::default());

        engine.load_initial_if_required().await.unwrap();

        let items = engine.items();
        assert_eq!(items.len(), 2);
        // post-0 is the newest; the engine appends in fetch order.
        assert_eq!(items[0].post().id, "post-0");
        assert_eq!(items[1].post().id, "post-1");
        assert!(items[0].post().created_at > items[1].post().created_at);
    }

    #[tokio::test]
    async fn test_display_below_threshold_issues_no_fetch() {
        let config = TimelineConfig {
            load_threshold: 2,
            ..TimelineConfig::default()
        };
        let source = Arc::new(FakeSource::with_posts(12));
        let engine = engine_with(source.clone(), config);

        engine.load_initial_if_required().await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        // 5 items loaded, threshold 2: indices 0..=2 are below the margin.
        engine.will_display_entry(0).await.unwrap();
        engine.will_display_entry(1).await.unwrap();
        engine.will_display_entry(2).await.unwrap();
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(engine.len(), 5);
    }

    #[tokio::test]
    async fn test_display_near_end_fetches_next_page() {
        let config = TimelineConfig {
            load_threshold: 2,
            ..TimelineConfig::default()
        };
        let source = Arc::new(FakeSource::with_posts(12));
        let engine = engine_with(source.clone(), config);

        engine.load_initial_if_required().await.unwrap();
        engine.will_display_entry(4).await.unwrap();

        assert_eq!(engine.len(), 10);
        assert_eq!(*source.ranges.lock().unwrap(), vec![(0, 5), (5, 5)]);
    }

    #[tokio::test]
    async fn test_no_fetch_while_one_is_in_flight() {
        let config = TimelineConfig {
            load_threshold: 5,
            ..TimelineConfig::default()
        };
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(20, gate.clone()));
        let engine = Arc::new(engine_with(source.clone(), config));

        let e = engine.clone();
        let initial = tokio::spawn(async move { e.load_initial_if_required().await });
        tokio::task::yield_now().await;
        gate.notify_waiters();
        initial.await.unwrap().unwrap();

        let e = engine.clone();
        let page = tokio::spawn(async move { e.will_display_entry(4).await });
        tokio::task::yield_now().await;
        assert!(engine.is_loading());

        // Triggers while the page fetch is outstanding are no-ops.
        engine.will_display_entry(4).await.unwrap();
        engine.will_display_entry(3).await.unwrap();
        assert_eq!(source.fetch_count(), 2);

        gate.notify_waiters();
        page.await.unwrap().unwrap();
        assert_eq!(engine.len(), 10);
    }

    #[tokio::test]
    async fn test_short_page_marks_end_of_data() {
        let source = Arc::new(FakeSource::with_posts(3));
        let engine = engine_with(source.clone(), TimelineConfig::default());

        engine.load_initial_if_required().await.unwrap();
        assert_eq!(engine.len(), 3);
        assert!(!engine.has_more());

        // Displaying the last item issues no further fetch.
        engine.will_display_entry(2).await.unwrap();
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_exact_final_page_then_empty_page_ends_data() {
        let source = Arc::new(FakeSource::with_posts(5));
        let engine = engine_with(source.clone(), TimelineConfig::default());

        engine.load_initial_if_required().await.unwrap();
        assert_eq!(engine.len(), 5);
        assert!(engine.has_more());

        // The next page comes back empty, which is a short page.
        engine.will_display_entry(4).await.unwrap();
        assert_eq!(engine.len(), 5);
        assert!(!engine.has_more());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_page_leaves_list_unchanged_and_retryable() {
        let source = Arc::new(FakeSource::failing());
        let engine = engine_with(source.clone(), TimelineConfig::default());

        let events: Arc<Mutex<Vec<TimelineEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = engine.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let err = engine.load_initial_if_required().await.unwrap_err();
        assert!(matches!(err, TimelineError::Fetch(_)));
        assert!(engine.is_empty());
        assert!(!engine.is_loading());
        assert!(matches!(
            events.lock().unwrap()[0],
            TimelineEvent::LoadFailed { offset: 0, .. }
        ));

        // The failed initial load may be retried.
        engine.load_initial_if_required().await.unwrap_err();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_hung_fetch_times_out_and_clears_loading() {
        let config = TimelineConfig {
            fetch_timeout: Duration::from_millis(20),
            ..TimelineConfig::default()
        };
        let source = Arc::new(FakeSource::hanging());
        let engine = engine_with(source, config);

        let err = engine.load_initial_if_required().await.unwrap_err();
        assert_eq!(err, TimelineError::Timeout);
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn test_reset_starts_a_fresh_session() {
        let source = Arc::new(FakeSource::with_posts(3));
        let engine = engine_with(source.clone(), TimelineConfig::default());

        engine.load_initial_if_required().await.unwrap();
        assert!(!engine.has_more());

        engine.reset();
        assert!(engine.is_empty());
        assert!(engine.has_more());

        engine.load_initial_if_required().await.unwrap();
        assert_eq!(engine.len(), 3);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_page() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(12, gate.clone()));
        let engine = Arc::new(engine_with(source.clone(), TimelineConfig::default()));

        let e = engine.clone();
        let initial = tokio::spawn(async move { e.load_initial_if_required().await });
        tokio::task::yield_now().await;

        engine.reset();
        gate.notify_waiters();
        initial.await.unwrap().unwrap();

        // The stale page never lands in the fresh session.
        assert!(engine.is_empty());
        assert!(!engine.is_loading());
    }

    #[tokio::test]
    async fn test_page_loaded_and_end_events_are_emitted() {
        let source = Arc::new(FakeSource::with_posts(3));
        let engine = engine_with(source, TimelineConfig::default());

        let events: Arc<Mutex<Vec<TimelineEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = engine.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        engine.load_initial_if_required().await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                TimelineEvent::PageLoaded {
                    offset: 0,
                    count: 3
                },
                TimelineEvent::EndOfData,
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_returns_durable_post_and_emits_event() {
        let source = Arc::new(FakeSource::with_posts(0));
        let engine = engine_with(source, TimelineConfig::default());

        let events: Arc<Mutex<Vec<TimelineEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = engine.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let post = engine
            .publish(Draft {
                author_id: "alice".to_string(),
                image: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert_eq!(post.id, "post-new");
        assert_eq!(post.author_id, "alice");
        assert_eq!(
            *events.lock().unwrap(),
            vec![TimelineEvent::Published {
                id: "post-new".to_string()
            }]
        );
    }
}
