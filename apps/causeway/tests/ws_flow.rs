//! End-to-end flows against a real hub over WebSocket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use causeway::hub::Hub;
use causeway::protocol::{ClientMessage, ClientStatus, ServerMessage};
use causeway::routes;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_hub(pin: Option<String>) -> Result<String> {
    let hub = Arc::new(Hub::new(pin));
    let app = routes::router(hub);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("ws://{addr}/ws"))
}

async fn connect(url: &str) -> Result<WsClient> {
    let (stream, _) = timeout(Duration::from_secs(5), connect_async(url))
        .await
        .map_err(|_| anyhow!("connect timed out"))??;
    Ok(stream)
}

async fn send(client: &mut WsClient, message: &ClientMessage) -> Result<()> {
    client
        .send(Message::Text(serde_json::to_string(message)?.into()))
        .await?;
    Ok(())
}

async fn recv(client: &mut WsClient) -> Result<ServerMessage> {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for a frame"))?
            .ok_or_else(|| anyhow!("connection closed"))??;
        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

/// Reads frames until `pick` matches, skipping interleaved broadcasts.
async fn wait_for<T>(
    client: &mut WsClient,
    mut pick: impl FnMut(ServerMessage) -> Option<T>,
) -> Result<T> {
    for _ in 0..32 {
        if let Some(value) = pick(recv(client).await?) {
            return Ok(value);
        }
    }
    Err(anyhow!("expected frame never arrived"))
}

async fn register(client: &mut WsClient, name: &str, pin: Option<&str>) -> Result<String> {
    send(
        client,
        &ClientMessage::Register {
            client_name: Some(name.to_string()),
            pin: pin.map(String::from),
        },
    )
    .await?;
    wait_for(client, |message| match message {
        ServerMessage::RegistrationConfirmed { client_id, .. } => Some(client_id),
        _ => None,
    })
    .await
}

#[tokio::test]
async fn full_handshake_reaches_connected_peer_lists() -> Result<()> {
    let url = spawn_hub(None).await?;
    let mut u1 = connect(&url).await?;
    let mut u2 = connect(&url).await?;

    let id1 = register(&mut u1, "u1", None).await?;
    let id2 = register(&mut u2, "u2", None).await?;

    send(
        &mut u1,
        &ClientMessage::ConnectRequest {
            target_id: id2.clone(),
        },
    )
    .await?;
    let from = wait_for(&mut u2, |message| match message {
        ServerMessage::ConnectionRequest { from_id, from_name } => Some((from_id, from_name)),
        _ => None,
    })
    .await?;
    assert_eq!(from, (id1.clone(), "u1".to_string()));

    send(
        &mut u2,
        &ClientMessage::ConnectionResponse {
            target_id: id1.clone(),
            accepted: true,
        },
    )
    .await?;
    let from_id = wait_for(&mut u1, |message| match message {
        ServerMessage::ConnectionAccepted { from_id, .. } => Some(from_id),
        _ => None,
    })
    .await?;
    assert_eq!(from_id, id2);

    send(
        &mut u1,
        &ClientMessage::ConnectionEstablished {
            target_id: id2.clone(),
        },
    )
    .await?;
    let peer = wait_for(&mut u1, |message| match message {
        ServerMessage::PeerConnected { peer_id, .. } => Some(peer_id),
        _ => None,
    })
    .await?;
    assert_eq!(peer, id2);
    let peer = wait_for(&mut u2, |message| match message {
        ServerMessage::PeerConnected { peer_id, .. } => Some(peer_id),
        _ => None,
    })
    .await?;
    assert_eq!(peer, id1);

    // both sides eventually see the other as connected, never themselves
    for (client, own_id, other_id) in [(&mut u1, &id1, &id2), (&mut u2, &id2, &id1)] {
        let peers = wait_for(client, |message| match message {
            ServerMessage::PeerList { peers }
                if peers.len() == 1 && peers[0].status == ClientStatus::Connected =>
            {
                Some(peers)
            }
            _ => None,
        })
        .await?;
        assert_eq!(&peers[0].id, other_id);
        assert!(peers.iter().all(|p| &p.id != own_id));
    }

    // closing u2 tears it down everywhere
    u2.close(None).await?;
    let peers = wait_for(&mut u1, |message| match message {
        ServerMessage::PeerList { peers } if peers.is_empty() => Some(peers),
        _ => None,
    })
    .await?;
    assert!(peers.is_empty());

    Ok(())
}

#[tokio::test]
async fn wrong_pin_is_rejected_and_session_stays_unregistered() -> Result<()> {
    let url = spawn_hub(Some("2468".into())).await?;
    let mut client = connect(&url).await?;

    send(
        &mut client,
        &ClientMessage::Register {
            client_name: Some("mallory".into()),
            pin: Some("0000".into()),
        },
    )
    .await?;
    let error = wait_for(&mut client, |message| match message {
        ServerMessage::RegistrationFailed { error } => Some(error),
        _ => None,
    })
    .await?;
    assert_eq!(error, "invalid pin");

    // the rejected session holds no identity, so directory queries fail
    send(&mut client, &ClientMessage::GetPeerList).await?;
    wait_for(&mut client, |message| match message {
        ServerMessage::ConnectionError { .. } => Some(()),
        _ => None,
    })
    .await?;

    Ok(())
}

#[tokio::test]
async fn ice_failures_are_silent_while_offers_surface_errors() -> Result<()> {
    let url = spawn_hub(None).await?;
    let mut client = connect(&url).await?;
    register(&mut client, "u1", None).await?;

    // an ICE candidate to a vanished peer produces nothing; the
    // connect-request right behind it is the first error to come back
    send(
        &mut client,
        &ClientMessage::WebrtcIceCandidate {
            target_id: "ghost".into(),
            candidate: serde_json::json!({"candidate": "candidate:0"}),
        },
    )
    .await?;
    send(
        &mut client,
        &ClientMessage::ConnectRequest {
            target_id: "ghost".into(),
        },
    )
    .await?;
    let first_error = wait_for(&mut client, |message| match message {
        ServerMessage::WebrtcError { .. } => Some("webrtc"),
        ServerMessage::ConnectionError { .. } => Some("connection"),
        _ => None,
    })
    .await?;
    assert_eq!(first_error, "connection");

    send(
        &mut client,
        &ClientMessage::WebrtcOffer {
            target_id: "ghost".into(),
            offer: serde_json::json!({"sdp": "v=0", "type": "offer"}),
        },
    )
    .await?;
    let error = wait_for(&mut client, |message| match message {
        ServerMessage::WebrtcError { error } => Some(error),
        _ => None,
    })
    .await?;
    assert_eq!(error, "target client not found");

    Ok(())
}

#[tokio::test]
async fn relayed_signals_pass_through_opaque() -> Result<()> {
    let url = spawn_hub(None).await?;
    let mut u1 = connect(&url).await?;
    let mut u2 = connect(&url).await?;
    let id1 = register(&mut u1, "u1", None).await?;
    let id2 = register(&mut u2, "u2", None).await?;

    let offer = serde_json::json!({"sdp": "v=0\r\no=- 0 0 IN IP4 0.0.0.0", "type": "offer"});
    send(
        &mut u1,
        &ClientMessage::WebrtcOffer {
            target_id: id2.clone(),
            offer: offer.clone(),
        },
    )
    .await?;
    let (from_id, relayed) = wait_for(&mut u2, |message| match message {
        ServerMessage::WebrtcOffer { from_id, offer } => Some((from_id, offer)),
        _ => None,
    })
    .await?;
    assert_eq!(from_id, id1);
    assert_eq!(relayed, offer);

    let answer = serde_json::json!({"sdp": "v=0", "type": "answer"});
    send(
        &mut u2,
        &ClientMessage::WebrtcAnswer {
            target_id: id1.clone(),
            answer: answer.clone(),
        },
    )
    .await?;
    let (from_id, relayed) = wait_for(&mut u1, |message| match message {
        ServerMessage::WebrtcAnswer { from_id, answer } => Some((from_id, answer)),
        _ => None,
    })
    .await?;
    assert_eq!(from_id, id2);
    assert_eq!(relayed, answer);

    Ok(())
}
