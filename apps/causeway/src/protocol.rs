use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Negotiation status of a registered client, as shown in peer lists.
///
/// A single scalar per client: `Online` after registration, `Connecting`
/// while a handshake is pending, `Connected` once at least one direct
/// peer link is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Online,
    Connecting,
    Connected,
}

/// A service advertised by a registered client.
///
/// Owned by the advertising client's registry record and destroyed with
/// it; peers only ever see snapshot copies inside peer lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAdvertisement {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// One row of the peer list delivered to a client: everything another
/// peer is allowed to see about a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEntry {
    pub id: String,
    pub name: String,
    pub status: ClientStatus,
    pub services: Vec<ServiceAdvertisement>,
}

/// Messages sent from a client to the hub.
///
/// Parsed at the transport boundary; nothing reaches the hub logic
/// without matching one of these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Enter the presence registry, optionally presenting the shared pin.
    #[serde(rename_all = "camelCase")]
    Register {
        #[serde(default)]
        client_name: Option<String>,
        #[serde(default)]
        pin: Option<String>,
    },
    /// Advertise a service to all peers.
    #[serde(rename_all = "camelCase")]
    AddService {
        service_name: String,
        service_url: String,
        #[serde(default)]
        service_ports: Option<Vec<u16>>,
        #[serde(default)]
        service_token: Option<String>,
    },
    /// Ask for the current peer directory without waiting for a broadcast.
    GetPeerList,
    /// Ask another peer to start negotiating a direct connection.
    #[serde(rename_all = "camelCase")]
    ConnectRequest { target_id: String },
    /// Answer a pending connection request.
    #[serde(rename_all = "camelCase")]
    ConnectionResponse { target_id: String, accepted: bool },
    /// Report that the direct link to `target_id` is up.
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished { target_id: String },
    /// Tear down the direct link to `target_id`.
    #[serde(rename_all = "camelCase")]
    DisconnectPeer { target_id: String },
    /// Relay an SDP offer to `target_id`. The payload is opaque to the hub.
    #[serde(rename_all = "camelCase")]
    WebrtcOffer { target_id: String, offer: Value },
    /// Relay an SDP answer to `target_id`.
    #[serde(rename_all = "camelCase")]
    WebrtcAnswer { target_id: String, answer: Value },
    /// Relay an ICE candidate to `target_id`. Best-effort: failures are
    /// dropped silently.
    #[serde(rename_all = "camelCase")]
    WebrtcIceCandidate { target_id: String, candidate: Value },
}

/// Messages sent from the hub to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Registration succeeded; echoes the minted id and resolved name.
    #[serde(rename_all = "camelCase")]
    RegistrationConfirmed {
        client_id: String,
        client_name: String,
    },
    /// Registration rejected (bad pin). Sent to the caller only.
    RegistrationFailed { error: String },
    /// The full directory visible to the recipient, self excluded.
    PeerList { peers: Vec<PeerEntry> },
    /// Another peer wants to connect to the recipient.
    #[serde(rename_all = "camelCase")]
    ConnectionRequest { from_id: String, from_name: String },
    /// The recipient's pending request was accepted.
    #[serde(rename_all = "camelCase")]
    ConnectionAccepted { from_id: String, from_name: String },
    /// The recipient's pending request was rejected.
    #[serde(rename_all = "camelCase")]
    ConnectionRejected { from_id: String, from_name: String },
    /// A direct link to the named peer is now established.
    #[serde(rename_all = "camelCase")]
    PeerConnected { peer_id: String, peer_name: String },
    /// The direct link to the named peer was torn down.
    #[serde(rename_all = "camelCase")]
    PeerDisconnected { peer_id: String, peer_name: String },
    /// Relayed SDP offer.
    #[serde(rename_all = "camelCase")]
    WebrtcOffer { from_id: String, offer: Value },
    /// Relayed SDP answer.
    #[serde(rename_all = "camelCase")]
    WebrtcAnswer { from_id: String, answer: Value },
    /// Relayed ICE candidate.
    #[serde(rename_all = "camelCase")]
    WebrtcIceCandidate { from_id: String, candidate: Value },
    /// A service advertisement was accepted.
    ServiceAdded { service: ServiceAdvertisement },
    /// A service advertisement was rejected.
    ServiceError { error: String },
    /// A handshake or directory operation failed.
    ConnectionError { error: String },
    /// An offer/answer relay failed.
    WebrtcError { error: String },
    /// A frame could not be parsed as any known event.
    InvalidMessage { error: String },
}
