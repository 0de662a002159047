use anyhow::Result;
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use crate::protocol::{ClientMessage, ClientStatus, ServerMessage};

#[derive(Parser, Debug)]
#[command(name = "causeway")]
#[command(about = "Causeway signaling hub and directory client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the peer directory of a running hub
    Peers {
        /// Hub URL (e.g., ws://localhost:8080)
        #[arg(short, long, default_value = "ws://localhost:8080")]
        url: String,

        /// Display name to register under
        #[arg(short, long)]
        name: Option<String>,

        /// Shared registration pin, if the hub requires one
        #[arg(short, long)]
        pin: Option<String>,
    },
}

/// Connects to a hub, registers, asks for the directory once and prints it.
pub async fn run_peers_client(
    url: String,
    name: Option<String>,
    pin: Option<String>,
) -> Result<()> {
    let ws_url = format!("{}/ws", url.trim_end_matches('/'));
    debug!("connecting to {}", ws_url);

    let (ws_stream, _) = match timeout(Duration::from_secs(5), connect_async(&ws_url)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return Err(anyhow::anyhow!("connection failed: {e}")),
        Err(_) => {
            return Err(anyhow::anyhow!(
                "connection timeout - is the hub running at {ws_url}?"
            ))
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let register = ClientMessage::Register {
        client_name: name,
        pin,
    };
    write
        .send(Message::Text(serde_json::to_string(&register)?.into()))
        .await?;

    let peers = timeout(Duration::from_secs(5), async {
        while let Some(msg) = read.next().await {
            let Message::Text(text) = msg? else { continue };
            match serde_json::from_str::<ServerMessage>(&text)? {
                ServerMessage::RegistrationConfirmed { client_id, .. } => {
                    debug!("registered as {}", client_id);
                    let query = serde_json::to_string(&ClientMessage::GetPeerList)?;
                    write.send(Message::Text(query.into())).await?;
                }
                ServerMessage::RegistrationFailed { error } => {
                    return Err(anyhow::anyhow!("registration failed: {error}"));
                }
                ServerMessage::PeerList { peers } => return Ok(peers),
                _ => {}
            }
        }
        Err(anyhow::anyhow!("connection closed unexpectedly"))
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for the peer list"))??;

    if peers.is_empty() {
        println!("no other peers registered");
    } else {
        println!("{:<38} {:<20} {:<12} services", "id", "name", "status");
        for peer in &peers {
            println!(
                "{:<38} {:<20} {:<12} {}",
                peer.id,
                peer.name,
                status_label(peer.status),
                peer.services.len()
            );
        }
    }

    Ok(())
}

fn status_label(status: ClientStatus) -> &'static str {
    match status {
        ClientStatus::Online => "online",
        ClientStatus::Connecting => "connecting",
        ClientStatus::Connected => "connected",
    }
}
