use std::io::IsTerminal;
use std::sync::Arc;

use mbp_replica::config::{AppConfig, fetch_config};
use mbp_replica::replica::{FeedHandle, OrderBookReplica};
use mbp_replica::websocket::run_session;
use mbp_replica::{ReplicaError, tui};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), ReplicaError> {
    let app_config = fetch_config()?;
    let (replica, feed) = OrderBookReplica::new(app_config.engine.replica_options());

    if std::io::stdout().is_terminal() {
        // The view owns the screen, so logs go to a file.
        let log_file = std::fs::File::create(&app_config.log_file).map_err(|e| {
            ReplicaError::Io(format!("failed to create {}: {e}", app_config.log_file))
        })?;
        tracing_subscriber::fmt()
            .with_writer(Arc::new(log_file))
            .with_ansi(false)
            .init();

        tui::run(&app_config, replica, feed).await
    } else {
        tracing_subscriber::fmt::init();
        run_headless(&app_config, replica, feed).await
    }
}

/// Logs each consumption cycle instead of drawing the book.
async fn run_headless(
    config: &AppConfig,
    mut replica: OrderBookReplica,
    feed: FeedHandle,
) -> Result<(), ReplicaError> {
    let mut session = tokio::spawn(run_session(config.feed.clone(), feed));

    tokio::select! {
        waited = replica
            .refresh()
            .wait_until_complete(config.engine.poll_interval(), config.engine.refresh_timeout()) => {
            waited?;
        }
        finished = &mut session => {
            warn!("Feed session ended before the book was complete");
            return finished.map_err(|e| ReplicaError::Io(e.to_string()))?;
        }
    }

    let mut interval = tokio::time::interval(config.engine.render_interval());
    let session_result = loop {
        tokio::select! {
            _ = interval.tick() => log_cycle(&mut replica),
            finished = &mut session => {
                break finished.map_err(|e| ReplicaError::Io(e.to_string()))?;
            }
        }
    };

    // Apply whatever the session queued before it ended.
    log_cycle(&mut replica);
    let snapshot = replica.snapshot();
    info!(
        entries = snapshot.entries.len(),
        summary_fields = snapshot.summary.len(),
        anomalies = ?replica.anomalies(),
        "Final order book state"
    );

    session_result
}

/// Drains the queue and logs the book only when it changed since the last
/// logged cycle.
fn log_cycle(replica: &mut OrderBookReplica) {
    let change_set = replica.drain_and_apply();
    if !change_set.dirty {
        return;
    }
    let snapshot = replica.snapshot();

    info!(
        changes = change_set.changes.len(),
        depth = snapshot.entries.len(),
        complete = change_set.book_complete,
        queued = change_set.queue_depth,
        anomalies = change_set.anomalies.total(),
        "Book updated"
    );
    for (name, value) in change_set.touched_summary_fields() {
        info!(field = name, %value, "Summary");
    }
}
