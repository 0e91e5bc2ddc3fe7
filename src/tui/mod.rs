//! Terminal User Interface consuming the order book replica.
//!
//! Provides a Ratatui-based view of the live book: a summary row, the
//! price levels sorted by a selectable column, and recently changed
//! levels highlighted.

pub mod app;
pub mod event;
pub mod terminal;
pub mod ui;

pub use app::App;
pub use event::{Event, Message};
pub use terminal::{Tui, install_panic_hook, restore_terminal, setup_terminal};
pub use ui::render;

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::Result;
use crate::config::{AppConfig, FeedConfig};
use crate::replica::FeedHandle;
use crate::replica::OrderBookReplica;

/// Runs the feed session and the order book view until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be set up, drawn or restored.
pub async fn run(config: &AppConfig, mut replica: OrderBookReplica, feed: FeedHandle) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let watcher = tokio::spawn(watch_refresh(
        feed.clone(),
        config.engine.poll_interval(),
        config.engine.refresh_timeout(),
        tx.clone(),
    ));
    let session = tokio::spawn(run_feed(config.feed.clone(), feed, tx.clone()));

    event::spawn_event_reader(tx.clone());
    event::spawn_tick_timer(tx, config.engine.render_interval());

    install_panic_hook();
    let mut terminal = setup_terminal()?;
    let mut app = App::new(&config.feed.ric, config.engine.highlight_duration());

    let outcome = loop {
        let drawn = if app.take_redraw() {
            terminal.draw(|frame| render(frame, &app)).map(|_| ())
        } else {
            Ok(())
        };
        if let Err(e) = drawn {
            break Err(crate::ReplicaError::Io(format!("failed to draw: {e}")));
        }

        let Some(message) = rx.recv().await else {
            break Ok(());
        };
        event::update(&mut app, &mut replica, message);

        if app.should_quit {
            break Ok(());
        }
    };

    session.abort();
    watcher.abort();
    restore_terminal(&mut terminal)?;
    info!(
        entries = replica.store().len(),
        cycles = replica.cycles(),
        anomalies = replica.anomalies().total(),
        "Order book view closed"
    );

    outcome
}

/// Opens the feed session, reports the connection, then streams until the
/// session ends. A failed connect is reported only as [`Message::FeedClosed`].
async fn run_feed(config: FeedConfig, feed: FeedHandle, tx: mpsc::UnboundedSender<Message>) {
    let result = match crate::websocket::open_session(&config).await {
        Ok((write, read)) => {
            let _ = tx.send(Message::FeedConnected);
            crate::websocket::drive_session(write, read, &config.ric, feed).await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        warn!("Feed session failed: {e}");
    }
    let _ = tx.send(Message::FeedClosed(result.err().map(|e| e.to_string())));
}

/// Waits for the initial refresh with a bounded poll and reports the outcome.
async fn watch_refresh(
    feed: FeedHandle,
    poll: Duration,
    timeout: Duration,
    tx: mpsc::UnboundedSender<Message>,
) {
    match feed.wait_until_complete(poll, timeout).await {
        Ok(()) => {
            let _ = tx.send(Message::BookComplete);
        }
        Err(e) => {
            warn!("{e}");
            let _ = tx.send(Message::RefreshTimedOut);
        }
    }
}
