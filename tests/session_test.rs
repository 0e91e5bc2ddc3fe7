//! Session tests against a loopback `tr_json2` server serving recorded
//! frames, so the connect/login/item-request sequence runs end to end.

mod common;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tungstenite::Message;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::HeaderValue;

use mbp_replica::ReplicaError;
use mbp_replica::config::FeedConfig;
use mbp_replica::replica::{OrderBookReplica, ReplicaOptions};
use mbp_replica::websocket::{SUBPROTOCOL, drive_session, open_session, run_session};

use common::{LOGIN_REFRESH_JSON, REFRESH_PART1_JSON, REFRESH_PART2_JSON};

fn feed_config(url: String) -> FeedConfig {
    FeedConfig {
        websocket_url: url,
        user: "tester".to_string(),
        app_id: "256".to_string(),
        position: "127.0.0.1".to_string(),
        ric: "VOD.L".to_string(),
        ca_file: None,
    }
}

/// Accepts one client, answers its login and item request with the
/// recorded refresh, then closes. Returns the two client requests.
async fn serve_refresh(listener: TcpListener) -> Vec<String> {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = accept_hdr_async(stream, |_: &Request, mut response: Response| {
        response
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .expect("handshake");

    let mut requests = Vec::new();
    let replies: [&[&str]; 2] = [
        &[LOGIN_REFRESH_JSON],
        &[REFRESH_PART1_JSON, REFRESH_PART2_JSON],
    ];
    for frames in replies {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => requests.push(text.to_string()),
            other => panic!("expected a text request, got {other:?}"),
        }
        for frame in frames {
            ws.send(Message::Text(frame.to_string().into()))
                .await
                .expect("send frame");
        }
    }

    ws.send(Message::Close(None)).await.expect("close");
    while let Some(Ok(_)) = ws.next().await {}
    requests
}

#[tokio::test]
async fn test_session_logs_in_requests_item_and_completes_book() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/WebSocket", listener.local_addr().expect("addr"));
    let server = tokio::spawn(serve_refresh(listener));

    let (mut replica, feed) = OrderBookReplica::new(ReplicaOptions::default());
    let config = feed_config(url);
    let (write, read) = open_session(&config).await.expect("open session");
    drive_session(write, read, &config.ric, feed)
        .await
        .expect("session");

    let requests = server.await.expect("server task");
    assert!(requests[0].contains("\"Login\""));
    assert!(requests[0].contains("tester"));
    assert!(requests[1].contains("\"MarketByPrice\""));
    assert!(requests[1].contains("VOD.L"));

    let change_set = replica.drain_and_apply();
    assert!(change_set.book_complete);
    assert_eq!(change_set.entry_count, 4);
    assert!(change_set.dirty);
}

#[tokio::test]
async fn test_open_session_fails_before_connecting_with_bad_ca_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = feed_config("wss://127.0.0.1:1/WebSocket".to_string());
    config.ca_file = Some(dir.path().join("absent.pem"));

    let result = open_session(&config).await;
    assert!(matches!(result, Err(ReplicaError::Tls(_))));
}

#[tokio::test]
async fn test_run_session_reports_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/WebSocket", listener.local_addr().expect("addr"));
    drop(listener);

    let (_replica, feed) = OrderBookReplica::new(ReplicaOptions::default());
    let result = run_session(feed_config(url), feed).await;
    assert!(result.is_err());
}
