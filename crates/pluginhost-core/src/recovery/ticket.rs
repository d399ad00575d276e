//! Saved-state blobs parked outside of relaunch intents.
//!
//! A blob may hold plugin-defined types that cannot be decoded before the
//! plugin is loaded, so the relaunch intent only carries the ticket id.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use pluginhost_protocols::SavedState;

/// Which creation callback the blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// State passed to the create callback.
    Icicle,
    /// State passed to the restore callback.
    SavedState,
}

#[derive(Debug, Clone)]
pub struct RecoveryTicket {
    pub id: Uuid,
    pub kind: TicketKind,
    pub state: SavedState,
    pub created_at: DateTime<Utc>,
}

/// In-memory ticket map. Every ticket can be taken exactly once.
#[derive(Default)]
pub struct TicketStore {
    tickets: DashMap<Uuid, RecoveryTicket>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stash(&self, kind: TicketKind, state: SavedState) -> Uuid {
        let ticket = RecoveryTicket {
            id: Uuid::new_v4(),
            kind,
            state,
            created_at: Utc::now(),
        };
        let id = ticket.id;
        debug!(ticket = %id, ?kind, bytes = ticket.state.len(), "stashed saved state");
        self.tickets.insert(id, ticket);
        id
    }

    /// Remove and return the ticket.
    pub fn take(&self, id: Uuid) -> Option<RecoveryTicket> {
        self.tickets.remove(&id).map(|(_, ticket)| ticket)
    }

    /// Remove and return the ticket only if it is of `kind`.
    pub fn take_kind(&self, id: Uuid, kind: TicketKind) -> Option<RecoveryTicket> {
        self.tickets
            .remove_if(&id, |_, ticket| ticket.kind == kind)
            .map(|(_, ticket)| ticket)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.tickets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}
