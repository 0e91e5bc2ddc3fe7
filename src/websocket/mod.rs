//! Async WebSocket client for a `tr_json2` market data server.
//!
//! This module is organized by domain:
//! - [`session`] - Login, item request and pong messages sent to the server
//! - [`handler`] - Incoming message classification feeding the replica

mod handler;
mod session;

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{info, warn};
use tungstenite::Message;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;

use crate::Result;
use crate::config::FeedConfig;
use crate::replica::FeedHandle;

pub use handler::{FeedAdapter, Outbound};
pub use session::{send_item_request, send_login, send_outbound, send_pong};

/// WebSocket subprotocol spoken by the server.
pub const SUBPROTOCOL: &str = "tr_json2";

/// Write half of a feed connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a feed connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection advertising the `tr_json2` subprotocol.
///
/// `tls` replaces the default web PKI roots for `wss://` URLs.
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if the URL is invalid or
/// the handshake fails.
pub async fn connect(
    url: &str,
    tls: Option<Arc<ClientConfig>>,
) -> Result<(WsWriter, WsReader)> {
    let mut request = url.into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(SUBPROTOCOL),
    );
    headers.insert(
        "User-Agent",
        HeaderValue::from_static(concat!("mbp-replica/", env!("CARGO_PKG_VERSION"))),
    );

    let connector = tls.map(Connector::Rustls);
    let (ws_stream, _) = connect_async_tls_with_config(request, None, false, connector).await?;
    info!(url, "WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Connects to the configured server and sends the login request.
///
/// The pinned CA roots from `config.ca_file` are used when set.
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if the CA file is
/// unusable, the handshake fails or the login cannot be sent.
pub async fn open_session(config: &FeedConfig) -> Result<(WsWriter, WsReader)> {
    let tls = config
        .ca_file
        .as_deref()
        .map(crate::tls::build_tls_config)
        .transpose()?;
    let (mut write, read) = connect(&config.websocket_url, tls).await?;
    send_login(&mut write, &config.user, &config.app_id, &config.position).await?;
    Ok((write, read))
}

/// Reads an open session until the server closes it or the item stream
/// is closed.
///
/// Requests `ric` once the login is accepted, answers pings and pushes
/// every MarketByPrice record through `feed`. Returning is the signal that
/// no more input will arrive; records already queued stay available to
/// the consumer.
///
/// # Errors
///
/// Returns a [`ReplicaError`](crate::ReplicaError) if sending a reply
/// fails or the connection errors while reading.
pub async fn drive_session(
    mut write: WsWriter,
    mut read: WsReader,
    ric: &str,
    feed: FeedHandle,
) -> Result<()> {
    let mut adapter = FeedAdapter::new(feed, ric);

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => match adapter.process_frame(text.as_str()) {
                Ok(replies) => {
                    for reply in &replies {
                        send_outbound(&mut write, reply).await?;
                    }
                }
                Err(e) => {
                    warn!("Skipping frame: {e}");
                }
            },
            Message::Close(frame) => {
                info!(?frame, "Server closed the connection");
                break;
            }
            _ => {}
        }

        if adapter.item_closed() {
            warn!(ric, "Item stream closed by server");
            break;
        }
    }

    info!(
        ric,
        queued = adapter.feed().queue_depth(),
        "Feed session ended"
    );

    Ok(())
}

/// Runs one feed session: [`open_session`] followed by [`drive_session`].
///
/// # Errors
///
/// Returns the first error from either step.
pub async fn run_session(config: FeedConfig, feed: FeedHandle) -> Result<()> {
    let (write, read) = open_session(&config).await?;
    drive_session(write, read, &config.ric, feed).await
}
