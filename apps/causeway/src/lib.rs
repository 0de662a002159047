//! Causeway - a rendezvous and signaling hub.
//!
//! Otherwise-unreachable peers connect here over a WebSocket, register
//! into an in-memory presence registry, and negotiate direct peer-to-peer
//! transports by exchanging offer/answer/ICE payloads through the hub.
//! The hub tracks who is online, who is negotiating and who is connected,
//! and pushes every client a fresh view of its peers after each change.
//! Application data never passes through here, only handshake metadata.

pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod websocket;
