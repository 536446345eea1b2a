//! In-memory blob cache with LRU eviction and single-flight fetches
//!
//! Provides a bounded, content-addressed cache for binary payloads shared
//! across consumers. Concurrent fetches for the same key collapse into one
//! remote call; every caller observes the same payload or the same error.

pub mod cache;
pub mod error;
pub mod remote;
pub mod types;

pub use cache::BlobCache;
pub use error::{BlobError, Result};
pub use remote::BlobRemote;
pub use types::CacheStats;
