//! Requests sent over the session: login, item request and pong.

use futures_util::SinkExt;
use serde::Serialize;
use tracing::{debug, info};
use tungstenite::Message;

use super::WsWriter;
use super::handler::Outbound;
use crate::Result;
use crate::models::{ItemRequest, LoginRequest, PongMessage};

async fn send_json<T: Serialize>(write: &mut WsWriter, payload: &T) -> Result<()> {
    let json = serde_json::to_string(payload)?;
    debug!("Sending: {}", json);
    write.send(Message::Text(json.into())).await?;

    Ok(())
}

/// Sends the login request that opens the session.
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if sending the message fails.
pub async fn send_login(
    write: &mut WsWriter,
    user: &str,
    app_id: &str,
    position: &str,
) -> Result<()> {
    let request = LoginRequest::new(user, app_id, position);
    send_json(write, &request).await?;
    info!(user, app_id, position, "Sent login request");

    Ok(())
}

/// Requests the MarketByPrice stream for one instrument.
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if sending the message fails.
pub async fn send_item_request(write: &mut WsWriter, ric: &str) -> Result<()> {
    let request = ItemRequest::market_by_price(ric);
    send_json(write, &request).await?;
    info!(ric, "Sent MarketByPrice request");

    Ok(())
}

/// Answers a server ping.
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if sending the message fails.
pub async fn send_pong(write: &mut WsWriter) -> Result<()> {
    send_json(write, &PongMessage::new()).await?;
    debug!("Sent pong");

    Ok(())
}

/// Sends a reply produced by the [`FeedAdapter`](super::FeedAdapter).
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if sending the message fails.
pub async fn send_outbound(write: &mut WsWriter, reply: &Outbound) -> Result<()> {
    match reply {
        Outbound::ItemRequest(request) => send_item_request(write, &request.key.name).await,
        Outbound::Pong => send_pong(write).await,
    }
}
