//! Relation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One relation record as stored remotely: "actor <relates to> entity".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    pub entity_id: String,
    /// `None` when the actor account no longer resolves (deleted account);
    /// such records are dropped during populate.
    pub actor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// State changes a display layer can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationEvent {
    /// The member set was fetched and assigned for the first time.
    Populated { members: usize },
    /// An optimistic toggle was applied locally.
    Toggled { actor_id: String, member: bool },
    /// A failed remote mutation rolled the entry back to `member`.
    Reverted { actor_id: String, member: bool },
}
