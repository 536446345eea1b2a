//! Per-entity relation store ("who likes this item")
//!
//! Keeps a lazily fetched set of actor identifiers per feed entity, applies
//! toggles optimistically before the remote store confirms them, and
//! reconciles late fetch results by merging, preferring local mutations.

pub mod error;
pub mod remote;
pub mod store;
pub mod types;

pub use error::{RelationError, Result};
pub use remote::RelationRemote;
pub use store::RelationStore;
pub use types::{RelationEvent, RelationRecord};
