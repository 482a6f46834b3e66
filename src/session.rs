//! Engine session registry.
//!
//! Sessions are id-keyed engine clients that survive across requests. The
//! registry is the only process-wide mutable resource in the bridge: a
//! sharded concurrent map from session id to client handle. Entries are
//! created lazily on first use of an id and dropped by explicit removal or
//! clear-all. Handles are Arcs, so destroying a session never interrupts a
//! dispatch that already resolved it; jar and connection safety within one
//! shared session is the engine client's own concern.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::engine::{EngineClient, EngineError};

struct SessionEntry {
    client: Arc<dyn EngineClient>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionRegistry {
    entries: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the client bound to `id`, if the session exists.
    pub fn get(&self, id: &str) -> Option<Arc<dyn EngineClient>> {
        self.entries.get(id).map(|entry| entry.client.clone())
    }

    /// Bind `client` to `id`, replacing any existing binding.
    pub fn create(&self, id: &str, client: Arc<dyn EngineClient>) -> Arc<dyn EngineClient> {
        debug!(session_id = id, "session created");
        self.entries.insert(
            id.to_string(),
            SessionEntry {
                client: client.clone(),
                created_at: Utc::now(),
            },
        );
        client
    }

    /// Resolve the client for `id`, building one on first use.
    ///
    /// The factory runs under the entry's shard lock, so two concurrent
    /// first-uses of one id produce a single client.
    pub fn get_or_create<F>(&self, id: &str, create: F) -> Result<Arc<dyn EngineClient>, EngineError>
    where
        F: FnOnce() -> Result<Arc<dyn EngineClient>, EngineError>,
    {
        if let Some(client) = self.get(id) {
            return Ok(client);
        }

        match self.entries.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                Ok(occupied.get().client.clone())
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let client = create()?;
                debug!(session_id = id, "session created");
                vacant.insert(SessionEntry {
                    client: client.clone(),
                    created_at: Utc::now(),
                });
                Ok(client)
            }
        }
    }

    /// Drop the session bound to `id`. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some((_, entry)) => {
                info!(
                    session_id = id,
                    lifetime_secs = (Utc::now() - entry.created_at).num_seconds(),
                    "session destroyed"
                );
                true
            }
            None => false,
        }
    }

    /// Drop every session. Returns how many were destroyed.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        if count > 0 {
            info!(count, "all sessions destroyed");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
