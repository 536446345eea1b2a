//! Paginated timeline engine for the Lumagram feed
//!
//! Grows an ordered list of feed items as the consumer scrolls, one
//! serialized range fetch at a time, and wires each item to the shared
//! blob cache and its per-item relation store. The display layer observes
//! engine state through events; no UI framework types appear here.

pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod source;
pub mod types;

pub use config::TimelineConfig;
pub use engine::TimelineEngine;
pub use error::{Result, TimelineError};
pub use item::FeedItem;
pub use source::FeedDataSource;
pub use types::{Draft, Post, TimelineEvent};
