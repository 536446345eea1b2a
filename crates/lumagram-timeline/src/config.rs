//! Engine configuration

use std::time::Duration;

const DEFAULT_PAGE_SIZE: usize = 5;
const DEFAULT_LOAD_THRESHOLD: usize = 5;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning knobs for the timeline engine.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Number of items requested by the first load.
    pub initial_page_size: usize,
    /// Number of items requested per subsequent page.
    pub page_size: usize,
    /// Trailing margin: displaying an item within this many positions of
    /// the loaded end triggers the next page fetch.
    pub load_threshold: usize,
    /// Upper bound on any single range fetch, so a hung data source cannot
    /// leave the engine loading forever.
    pub fetch_timeout: Duration,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            initial_page_size: DEFAULT_PAGE_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            load_threshold: DEFAULT_LOAD_THRESHOLD,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}
