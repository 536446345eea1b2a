//! Optimistic per-entity relation store
//!
//! Each entry moves through `Synced -> PendingAdd | PendingRemove` and back.
//! The local mutation lands before the remote call resolves; a failed call
//! reverts the entry instead of leaving it silently inconsistent. A fetch
//! resolving after local toggles merges, preferring the local mutations.

use crate::error::Result;
use crate::remote::RelationRemote;
use crate::types::RelationEvent;
use lumagram_events::{EventBus, Subscription};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    op: PendingOp,
    /// Ties a remote resolution back to the toggle that issued it; a newer
    /// toggle on the same actor supersedes the older resolution.
    epoch: u64,
}

struct StoreState {
    /// `None` until the first successful populate.
    members: Option<HashSet<String>>,
    fetch_in_flight: bool,
    /// Entries with an unconfirmed remote mutation.
    pending: HashMap<String, PendingEntry>,
    /// Outcomes confirmed remotely before the first populate. Folded into
    /// the member set when it lands.
    confirmed: HashMap<String, bool>,
    /// Local outcomes decided while a fetch was in flight, merged over the
    /// snapshot when it lands.
    flight_overrides: HashMap<String, bool>,
    epoch: u64,
}

/// The set of actors holding a relation to one entity (e.g. its likers).
pub struct RelationStore {
    entity_id: String,
    state: Mutex<StoreState>,
    events: EventBus<RelationEvent>,
}

impl RelationStore {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: Mutex::new(StoreState {
                members: None,
                fetch_in_flight: false,
                pending: HashMap::new(),
                confirmed: HashMap::new(),
                flight_overrides: HashMap::new(),
                epoch: 0,
            }),
            events: EventBus::new(),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription<RelationEvent>
    where
        F: Fn(&RelationEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the member set has been populated.
    pub fn is_populated(&self) -> bool {
        self.lock().members.is_some()
    }

    /// Whether `actor_id` currently holds the relation. Unknown (not yet
    /// fetched, no pending toggle) is reported as `false`, never `true`.
    pub fn contains(&self, actor_id: &str) -> bool {
        let state = self.lock();
        effective_membership(&state, actor_id)
    }

    /// Effective member snapshot, pending toggles applied. `None` while the
    /// set has not been fetched (pre-fetch toggles are still visible through
    /// `contains`).
    pub fn members(&self) -> Option<HashSet<String>> {
        let state = self.lock();
        let mut set = state.members.clone()?;
        for (actor, entry) in &state.pending {
            match entry.op {
                PendingOp::Add => set.insert(actor.clone()),
                PendingOp::Remove => set.remove(actor),
            };
        }
        Some(set)
    }

    /// Populate the member set from the remote store, once.
    ///
    /// A no-op when already populated or when a fetch is in flight, so
    /// concurrent callers never issue a second remote query. Records whose
    /// actor no longer resolves are dropped. Toggles confirmed before the
    /// populate, and toggles that ran while the fetch was outstanding, win
    /// over the fetched snapshot.
    pub async fn fetch_if_needed(&self, remote: &dyn RelationRemote) -> Result<()> {
        {
            let mut state = self.lock();
            if state.members.is_some() || state.fetch_in_flight {
                return Ok(());
            }
            state.fetch_in_flight = true;
            state.flight_overrides.clear();
        }

        let result = remote.fetch_relations(&self.entity_id).await;

        let event = {
            let mut state = self.lock();
            state.fetch_in_flight = false;
            match result {
                Ok(records) => {
                    let total = records.len();
                    let mut set: HashSet<String> =
                        records.into_iter().filter_map(|r| r.actor_id).collect();
                    if set.len() < total {
                        debug!(
                            entity_id = %self.entity_id,
                            dropped = total - set.len(),
                            "dropped relation records with dangling actors"
                        );
                    }
                    let confirmed: Vec<(String, bool)> =
                        state.confirmed.drain().collect();
                    for (actor, member) in confirmed {
                        if member {
                            set.insert(actor);
                        } else {
                            set.remove(&actor);
                        }
                    }
                    let overrides: Vec<(String, bool)> =
                        state.flight_overrides.drain().collect();
                    for (actor, member) in overrides {
                        if member {
                            set.insert(actor);
                        } else {
                            set.remove(&actor);
                        }
                    }
                    for (actor, entry) in &state.pending {
                        match entry.op {
                            PendingOp::Add => set.insert(actor.clone()),
                            PendingOp::Remove => set.remove(actor),
                        };
                    }
                    let members = set.len();
                    state.members = Some(set);
                    RelationEvent::Populated { members }
                }
                Err(e) => {
                    state.flight_overrides.clear();
                    warn!(entity_id = %self.entity_id, error = %e, "relation fetch failed");
                    return Err(e);
                }
            }
        };
        self.events.emit(&event);
        Ok(())
    }

    /// Flip `actor_id`'s membership, locally first, then remotely.
    ///
    /// Returns the new membership on success. On remote failure the entry
    /// reverts to its pre-toggle value and the error is surfaced. A toggle
    /// issued while an earlier one on the same actor is still unconfirmed
    /// supersedes it.
    pub async fn toggle(&self, remote: &dyn RelationRemote, actor_id: &str) -> Result<bool> {
        let (becoming_member, epoch) = {
            let mut state = self.lock();
            let becoming = !effective_membership(&state, actor_id);
            state.epoch += 1;
            let epoch = state.epoch;
            state.pending.insert(
                actor_id.to_string(),
                PendingEntry {
                    op: if becoming {
                        PendingOp::Add
                    } else {
                        PendingOp::Remove
                    },
                    epoch,
                },
            );
            if let Some(members) = state.members.as_mut() {
                if becoming {
                    members.insert(actor_id.to_string());
                } else {
                    members.remove(actor_id);
                }
            }
            if state.fetch_in_flight {
                state.flight_overrides.insert(actor_id.to_string(), becoming);
            }
            (becoming, epoch)
        };
        self.events.emit(&RelationEvent::Toggled {
            actor_id: actor_id.to_string(),
            member: becoming_member,
        });

        let result = if becoming_member {
            remote.add_relation(&self.entity_id, actor_id).await
        } else {
            remote.remove_relation(&self.entity_id, actor_id).await
        };

        match result {
            Ok(()) => {
                let mut state = self.lock();
                // Only this toggle's resolution may settle the entry.
                if state.pending.get(actor_id).map(|e| e.epoch) == Some(epoch) {
                    state.pending.remove(actor_id);
                    // The member set may not exist yet; the confirmed outcome
                    // has to survive until a populate folds it in.
                    if state.members.is_none() {
                        state
                            .confirmed
                            .insert(actor_id.to_string(), becoming_member);
                    }
                }
                Ok(becoming_member)
            }
            Err(e) => {
                let revert = {
                    let mut state = self.lock();
                    if state.pending.get(actor_id).map(|e| e.epoch) == Some(epoch) {
                        state.pending.remove(actor_id);
                        if let Some(members) = state.members.as_mut() {
                            if becoming_member {
                                members.remove(actor_id);
                            } else {
                                members.insert(actor_id.to_string());
                            }
                        }
                        if state.fetch_in_flight {
                            state
                                .flight_overrides
                                .insert(actor_id.to_string(), !becoming_member);
                        }
                        true
                    } else {
                        // A newer toggle owns this entry now.
                        false
                    }
                };
                if revert {
                    self.events.emit(&RelationEvent::Reverted {
                        actor_id: actor_id.to_string(),
                        member: !becoming_member,
                    });
                }
                warn!(
                    entity_id = %self.entity_id,
                    actor_id,
                    error = %e,
                    reverted = revert,
                    "relation mutation failed"
                );
                Err(e)
            }
        }
    }
}

/// Pending toggles shadow confirmed pre-populate outcomes, which shadow the
/// fetched member set.
fn effective_membership(state: &StoreState, actor_id: &str) -> bool {
    match state.pending.get(actor_id) {
        Some(entry) => entry.op == PendingOp::Add,
        None => match state.confirmed.get(actor_id) {
            Some(member) => *member,
            None => state
                .members
                .as_ref()
                .is_some_and(|m| m.contains(actor_id)),
        },
    }
}
