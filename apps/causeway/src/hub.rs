//! Hub state: registry lock, lifecycle, handshake tracking and relay.
//!
//! Every operation takes the single registry lock, performs its
//! read-modify sequence and queues any notices before releasing it, so
//! concurrent events for different sessions can never interleave inside
//! one mutation. Delivery itself is non-blocking: each session owns an
//! unbounded outbound queue drained by its WebSocket task, so no send
//! awaits while the lock is held.

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::HubError;
use crate::protocol::{ClientStatus, ServerMessage, ServiceAdvertisement};
use crate::registry::{ClientRecord, Registry};

/// The three relay payload kinds the hub forwards without interpreting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Identity minted for a session at registration.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

pub struct Hub {
    pin: Option<String>,
    clients: Mutex<Registry>,
}

impl Hub {
    pub fn new(pin: Option<String>) -> Self {
        Self {
            pin,
            clients: Mutex::new(Registry::default()),
        }
    }

    /// Number of currently registered clients.
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Registers a session, minting its client id.
    ///
    /// With a configured pin, a mismatch rejects the registration before
    /// any state is touched: no record, no broadcast. `existing` carries
    /// the session's previous id when it re-registers on a live
    /// connection; the id is kept but the record is rebuilt from scratch
    /// so links held under the old identity cannot survive.
    pub async fn register(
        &self,
        existing: Option<&str>,
        client_name: Option<String>,
        pin: Option<String>,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<Identity, HubError> {
        if let Some(expected) = &self.pin {
            if pin.as_deref() != Some(expected.as_str()) {
                tracing::warn!("registration rejected: pin mismatch");
                return Err(HubError::InvalidPin);
            }
        }

        let mut clients = self.clients.lock().await;

        let id = match existing {
            Some(prev) if clients.contains(prev) => {
                scrub_peer(&mut clients, prev);
                clients.remove(prev);
                prev.to_string()
            }
            _ => Uuid::new_v4().to_string(),
        };
        let name = client_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Client-{}", &id[..8]));

        let record = ClientRecord::new(id.clone(), name.clone(), tx);
        record.send(ServerMessage::RegistrationConfirmed {
            client_id: id.clone(),
            client_name: name.clone(),
        });
        clients.put(record);

        tracing::info!(client = %id, name = %name, "client registered");
        broadcast_peer_lists(&clients);
        Ok(Identity { id, name })
    }

    /// Removes a session from the registry and from every remaining
    /// client's peer links. Idempotent: unknown ids are a no-op.
    pub async fn teardown(&self, id: &str) {
        let mut clients = self.clients.lock().await;
        if clients.remove(id).is_none() {
            return;
        }
        scrub_peer(&mut clients, id);
        tracing::info!(client = %id, "client deregistered");
        broadcast_peer_lists(&clients);
    }

    /// Appends a service advertisement to the caller's record.
    pub async fn add_service(
        &self,
        source: &str,
        name: String,
        url: String,
        ports: Option<Vec<u16>>,
        token: Option<String>,
    ) -> Result<(), HubError> {
        let mut clients = self.clients.lock().await;
        let record = clients.get_mut(source).ok_or(HubError::NotRegistered)?;
        if name.trim().is_empty() || url.trim().is_empty() {
            return Err(HubError::MissingServiceFields);
        }

        let service = ServiceAdvertisement {
            id: Uuid::new_v4().to_string(),
            name,
            url,
            ports,
            token,
        };
        record.services.push(service.clone());
        record.send(ServerMessage::ServiceAdded { service });

        broadcast_peer_lists(&clients);
        Ok(())
    }

    /// Delivers the current directory to the caller only.
    pub async fn peer_list(&self, source: &str) -> Result<(), HubError> {
        let clients = self.clients.lock().await;
        let record = clients.get(source).ok_or(HubError::NotRegistered)?;
        record.send(ServerMessage::PeerList {
            peers: clients.all_except(source),
        });
        Ok(())
    }

    /// Starts a handshake: the requester turns `connecting` and the
    /// target is asked to respond.
    pub async fn connect_request(&self, source: &str, target: &str) -> Result<(), HubError> {
        let mut clients = self.clients.lock().await;
        ensure_endpoints(&clients, source, target)?;

        let requester = clients.get_mut(source).ok_or(HubError::NotRegistered)?;
        requester.status = ClientStatus::Connecting;
        let notice = ServerMessage::ConnectionRequest {
            from_id: requester.id.clone(),
            from_name: requester.name.clone(),
        };
        if let Some(record) = clients.get(target) {
            record.send(notice);
        }

        tracing::debug!(from = %source, to = %target, "connection requested");
        broadcast_peer_lists(&clients);
        Ok(())
    }

    /// Answers a pending handshake. `target` is the original requester.
    ///
    /// Acceptance moves both endpoints to `connecting`; rejection returns
    /// both to `online`. Either way the requester is told.
    pub async fn connection_response(
        &self,
        source: &str,
        target: &str,
        accepted: bool,
    ) -> Result<(), HubError> {
        let mut clients = self.clients.lock().await;
        ensure_endpoints(&clients, source, target)?;

        let next = if accepted {
            ClientStatus::Connecting
        } else {
            ClientStatus::Online
        };
        let mut from_id = String::new();
        let mut from_name = String::new();
        if let Some(responder) = clients.get_mut(source) {
            responder.status = next;
            from_id = responder.id.clone();
            from_name = responder.name.clone();
        }
        if let Some(requester) = clients.get_mut(target) {
            requester.status = next;
            requester.send(if accepted {
                ServerMessage::ConnectionAccepted { from_id, from_name }
            } else {
                ServerMessage::ConnectionRejected { from_id, from_name }
            });
        }

        tracing::debug!(from = %source, to = %target, accepted, "connection response");
        broadcast_peer_lists(&clients);
        Ok(())
    }

    /// Records a direct link as up: both endpoints turn `connected` and
    /// each learns the other's identity. Idempotent per pair.
    pub async fn connection_established(&self, source: &str, target: &str) -> Result<(), HubError> {
        let mut clients = self.clients.lock().await;
        ensure_endpoints(&clients, source, target)?;

        let mut notices = Vec::with_capacity(2);
        for (this, other) in [(source, target), (target, source)] {
            if let Some(record) = clients.get_mut(this) {
                record.status = ClientStatus::Connected;
                record.peer_connections.insert(other.to_string());
                notices.push((
                    other.to_string(),
                    ServerMessage::PeerConnected {
                        peer_id: record.id.clone(),
                        peer_name: record.name.clone(),
                    },
                ));
            }
        }
        for (recipient, notice) in notices {
            if let Some(record) = clients.get(&recipient) {
                record.send(notice);
            }
        }

        tracing::info!(a = %source, b = %target, "peer link established");
        broadcast_peer_lists(&clients);
        Ok(())
    }

    /// Tears down the link between two endpoints. An endpoint reverts to
    /// `online` only once its last peer link is gone.
    pub async fn disconnect_peer(&self, source: &str, target: &str) -> Result<(), HubError> {
        let mut clients = self.clients.lock().await;
        ensure_endpoints(&clients, source, target)?;

        let mut notices = Vec::with_capacity(2);
        for (this, other) in [(source, target), (target, source)] {
            if let Some(record) = clients.get_mut(this) {
                record.peer_connections.remove(other);
                if record.peer_connections.is_empty() {
                    record.status = ClientStatus::Online;
                }
                notices.push((
                    other.to_string(),
                    ServerMessage::PeerDisconnected {
                        peer_id: record.id.clone(),
                        peer_name: record.name.clone(),
                    },
                ));
            }
        }
        for (recipient, notice) in notices {
            if let Some(record) = clients.get(&recipient) {
                record.send(notice);
            }
        }

        tracing::info!(a = %source, b = %target, "peer link closed");
        broadcast_peer_lists(&clients);
        Ok(())
    }

    /// Forwards an opaque signaling payload to `target`.
    ///
    /// Pure pass-through keyed by target identity: no validation, no
    /// interpretation, no broadcast.
    pub async fn relay(
        &self,
        kind: SignalKind,
        source: &str,
        target: &str,
        payload: Value,
    ) -> Result<(), HubError> {
        let clients = self.clients.lock().await;
        if !clients.contains(source) {
            return Err(HubError::NotRegistered);
        }
        let record = clients.get(target).ok_or(HubError::TargetNotFound)?;

        let from_id = source.to_string();
        record.send(match kind {
            SignalKind::Offer => ServerMessage::WebrtcOffer {
                from_id,
                offer: payload,
            },
            SignalKind::Answer => ServerMessage::WebrtcAnswer {
                from_id,
                answer: payload,
            },
            SignalKind::IceCandidate => ServerMessage::WebrtcIceCandidate {
                from_id,
                candidate: payload,
            },
        });
        tracing::trace!(from = %source, to = %target, ?kind, "signal relayed");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn peek(
        &self,
        id: &str,
    ) -> Option<(ClientStatus, std::collections::HashSet<String>)> {
        let clients = self.clients.lock().await;
        clients
            .get(id)
            .map(|record| (record.status, record.peer_connections.clone()))
    }
}

/// Both handshake endpoints must be registered for any transition.
fn ensure_endpoints(clients: &Registry, source: &str, target: &str) -> Result<(), HubError> {
    if !clients.contains(source) {
        return Err(HubError::NotRegistered);
    }
    if !clients.contains(target) {
        return Err(HubError::TargetNotFound);
    }
    Ok(())
}

/// Removes `id` from every remaining record's peer links.
fn scrub_peer(clients: &mut Registry, id: &str) {
    clients.for_each_mut(|record| {
        record.peer_connections.remove(id);
    });
}

/// Recomputes and delivers the per-client peer list, self excluded, to
/// every registered client. Full O(n²) recomputation on purpose; fine at
/// hub scale.
fn broadcast_peer_lists(clients: &Registry) {
    for record in clients.iter() {
        record.send(ServerMessage::PeerList {
            peers: clients.all_except(&record.id),
        });
    }
}
