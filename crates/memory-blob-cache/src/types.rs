//! Cache types

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A cached payload plus the bookkeeping the eviction policy needs.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub data: Arc<Vec<u8>>,
    /// Logical clock value of the most recent access, for LRU ordering.
    pub last_used: u64,
}

impl CacheEntry {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
    /// Fetches that attached to an already in-flight request instead of
    /// issuing their own remote call.
    pub coalesced: u64,
    pub evictions: u64,
}
