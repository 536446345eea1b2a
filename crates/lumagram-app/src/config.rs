use std::env;
use std::time::Duration;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub page_size: usize,
    pub load_threshold: usize,
    pub fetch_timeout: Duration,
    pub cache_bytes: u64,
    pub seed_posts: usize,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let page_size = env::var("LUMAGRAM_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let load_threshold = env::var("LUMAGRAM_LOAD_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let fetch_timeout = env::var("LUMAGRAM_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let cache_bytes = env::var("LUMAGRAM_CACHE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(64 * 1024 * 1024);

        let seed_posts = env::var("LUMAGRAM_SEED_POSTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(13);

        Self {
            page_size,
            load_threshold,
            fetch_timeout,
            cache_bytes,
            seed_posts,
        }
    }
}
