//! Authoritative in-memory store of registered clients.
//!
//! A record exists for a session exactly while it is registered; every
//! other component reads and mutates presence state through this map and
//! never caches a record beyond one event, since concurrent events for
//! other sessions revise it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::protocol::{ClientStatus, PeerEntry, ServerMessage, ServiceAdvertisement};

/// Presence state of one registered session.
#[derive(Debug)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub status: ClientStatus,
    /// Ids of peers this client holds an established link to.
    pub peer_connections: HashSet<String>,
    pub services: Vec<ServiceAdvertisement>,
    pub connected_at: DateTime<Utc>,
    /// Outbound queue of the owning WebSocket task.
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ClientRecord {
    pub fn new(id: String, name: String, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            name,
            status: ClientStatus::Online,
            peer_connections: HashSet::new(),
            services: Vec::new(),
            connected_at: Utc::now(),
            tx,
        }
    }

    /// Queues a message for delivery to this client without blocking.
    ///
    /// Returns `false` if the session's outbound queue is already closed,
    /// i.e. the transport is going away.
    pub fn send(&self, message: ServerMessage) -> bool {
        if self.tx.send(message).is_err() {
            tracing::debug!(client = %self.id, "outbound queue closed, message dropped");
            return false;
        }
        true
    }

    /// Snapshot of this record as other peers are allowed to see it.
    pub fn peer_entry(&self) -> PeerEntry {
        PeerEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            services: self.services.clone(),
        }
    }
}

/// The registry map. All mutations go through the hub's single lock.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<String, ClientRecord>,
}

impl Registry {
    pub fn put(&mut self, record: ClientRecord) {
        self.clients.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<&ClientRecord> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ClientRecord> {
        self.clients.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientRecord> {
        self.clients.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut ClientRecord)) {
        for record in self.clients.values_mut() {
            f(record);
        }
    }

    /// Snapshot copies of every record except `id`, in no particular order.
    ///
    /// Broadcasts hand these owned copies to the transport so no reader
    /// ever observes a record mid-mutation.
    pub fn all_except(&self, id: &str) -> Vec<PeerEntry> {
        self.clients
            .values()
            .filter(|record| record.id != id)
            .map(ClientRecord::peer_entry)
            .collect()
    }
}
