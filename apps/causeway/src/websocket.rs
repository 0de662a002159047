//! WebSocket transport: one task per connection, frames parsed at the
//! boundary and dispatched into the hub.
//!
//! Outbound traffic goes through an unbounded per-session queue drained
//! by a writer task, so hub operations never block on a slow socket.
//! Error notices follow the asymmetric policy: handshake and directory
//! failures surface as `connectionError`, offer/answer relay failures as
//! `webrtcError`, service failures as `serviceError`, and ICE candidate
//! relays fail silently.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::HubError;
use crate::hub::{Hub, SignalKind};
use crate::protocol::{ClientMessage, ServerMessage};

pub async fn websocket_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(err) => tracing::error!(%err, "outbound message failed to serialize"),
            }
        }
    });

    tracing::debug!("websocket connected");

    // Set once this session registers; used for teardown on close.
    let mut session: Option<String> = None;

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%err, "websocket read error");
                break;
            }
        };

        match frame {
            Message::Text(text) => handle_frame(&hub, &mut session, &tx, &text).await,
            // Binary frames carrying UTF-8 JSON are accepted for client
            // library compatibility.
            Message::Binary(data) => match String::from_utf8(data) {
                Ok(text) => handle_frame(&hub, &mut session, &tx, &text).await,
                Err(_) => tracing::debug!("non-utf8 binary frame ignored"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(id) = &session {
        hub.teardown(id).await;
    }
    tracing::debug!(session = ?session, "websocket disconnected");
}

async fn handle_frame(
    hub: &Hub,
    session: &mut Option<String>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    text: &str,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => dispatch(hub, session, tx, message).await,
        Err(err) => {
            tracing::debug!(%err, "unparseable frame");
            let _ = tx.send(ServerMessage::InvalidMessage {
                error: format!("invalid message format: {err}"),
            });
        }
    }
}

async fn dispatch(
    hub: &Hub,
    session: &mut Option<String>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    message: ClientMessage,
) {
    let source = session.clone();
    match message {
        ClientMessage::Register { client_name, pin } => {
            match hub
                .register(source.as_deref(), client_name, pin, tx.clone())
                .await
            {
                Ok(identity) => *session = Some(identity.id),
                Err(err) => {
                    let _ = tx.send(ServerMessage::RegistrationFailed {
                        error: err.to_string(),
                    });
                }
            }
        }
        ClientMessage::AddService {
            service_name,
            service_url,
            service_ports,
            service_token,
        } => {
            let result = match source.as_deref() {
                Some(id) => {
                    hub.add_service(id, service_name, service_url, service_ports, service_token)
                        .await
                }
                None => Err(HubError::NotRegistered),
            };
            if let Err(err) = result {
                let _ = tx.send(ServerMessage::ServiceError {
                    error: err.to_string(),
                });
            }
        }
        ClientMessage::GetPeerList => {
            let result = match source.as_deref() {
                Some(id) => hub.peer_list(id).await,
                None => Err(HubError::NotRegistered),
            };
            report_connection_error(tx, result);
        }
        ClientMessage::ConnectRequest { target_id } => {
            let result = match source.as_deref() {
                Some(id) => hub.connect_request(id, &target_id).await,
                None => Err(HubError::NotRegistered),
            };
            report_connection_error(tx, result);
        }
        ClientMessage::ConnectionResponse {
            target_id,
            accepted,
        } => {
            let result = match source.as_deref() {
                Some(id) => hub.connection_response(id, &target_id, accepted).await,
                None => Err(HubError::NotRegistered),
            };
            report_connection_error(tx, result);
        }
        ClientMessage::ConnectionEstablished { target_id } => {
            let result = match source.as_deref() {
                Some(id) => hub.connection_established(id, &target_id).await,
                None => Err(HubError::NotRegistered),
            };
            report_connection_error(tx, result);
        }
        ClientMessage::DisconnectPeer { target_id } => {
            let result = match source.as_deref() {
                Some(id) => hub.disconnect_peer(id, &target_id).await,
                None => Err(HubError::NotRegistered),
            };
            report_connection_error(tx, result);
        }
        ClientMessage::WebrtcOffer { target_id, offer } => {
            let result = match source.as_deref() {
                Some(id) => hub.relay(SignalKind::Offer, id, &target_id, offer).await,
                None => Err(HubError::NotRegistered),
            };
            if let Err(err) = result {
                let _ = tx.send(ServerMessage::WebrtcError {
                    error: err.to_string(),
                });
            }
        }
        ClientMessage::WebrtcAnswer { target_id, answer } => {
            let result = match source.as_deref() {
                Some(id) => hub.relay(SignalKind::Answer, id, &target_id, answer).await,
                None => Err(HubError::NotRegistered),
            };
            if let Err(err) = result {
                let _ = tx.send(ServerMessage::WebrtcError {
                    error: err.to_string(),
                });
            }
        }
        ClientMessage::WebrtcIceCandidate {
            target_id,
            candidate,
        } => {
            // Best-effort: a candidate aimed at a vanished peer is dropped
            // without telling the sender.
            let result = match source.as_deref() {
                Some(id) => {
                    hub.relay(SignalKind::IceCandidate, id, &target_id, candidate)
                        .await
                }
                None => Err(HubError::NotRegistered),
            };
            if let Err(err) = result {
                tracing::trace!(%err, "ice candidate dropped");
            }
        }
    }
}

fn report_connection_error(tx: &mpsc::UnboundedSender<ServerMessage>, result: Result<(), HubError>) {
    if let Err(err) = result {
        let _ = tx.send(ServerMessage::ConnectionError {
            error: err.to_string(),
        });
    }
}
