//! Remote relation store interface

use crate::error::Result;
use crate::types::RelationRecord;
use async_trait::async_trait;

/// Backend holding the durable relation records.
#[async_trait]
pub trait RelationRemote: Send + Sync {
    /// All relation records attached to `entity_id`, dangling actors
    /// included (the store filters them out).
    async fn fetch_relations(&self, entity_id: &str) -> Result<Vec<RelationRecord>>;

    /// Persist a new `(actor, entity)` relation record.
    async fn add_relation(&self, entity_id: &str, actor_id: &str) -> Result<()>;

    /// Remove every record matching `(actor, entity)`. Duplicate records
    /// are a data anomaly; implementations must delete all of them.
    async fn remove_relation(&self, entity_id: &str, actor_id: &str) -> Result<()>;
}
