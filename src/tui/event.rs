//! Event handling for the TUI.

use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use super::app::{App, BOOK_COLUMNS, FeedStatus};
use crate::replica::OrderBookReplica;

/// Events that can occur in the application.
#[derive(Debug)]
pub enum Event {
    /// A key was pressed.
    Key(KeyEvent),
    /// Terminal was resized.
    Resize(u16, u16),
    /// Periodic tick driving the consumption cycle.
    Tick,
}

/// Messages that update application state.
#[derive(Debug)]
pub enum Message {
    /// Input event from terminal.
    Input(Event),
    /// The connection is open and the login was sent.
    FeedConnected,
    /// The feed session ended, with the error if it failed.
    FeedClosed(Option<String>),
    /// The initial refresh finished within the refresh timeout.
    BookComplete,
    /// The refresh timeout elapsed before the book was complete.
    RefreshTimedOut,
}

/// Spawns a task that polls for terminal events and sends them to a channel.
pub fn spawn_event_reader(tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        loop {
            // Poll for events with a 50ms timeout
            match tokio::task::spawn_blocking(|| {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            })
            .await
            {
                Ok(Some(CrosstermEvent::Key(key))) => {
                    if tx.send(Message::Input(Event::Key(key))).is_err() {
                        break;
                    }
                }
                Ok(Some(CrosstermEvent::Resize(w, h))) => {
                    if tx.send(Message::Input(Event::Resize(w, h))).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}

/// Spawns a task that sends periodic tick events.
pub fn spawn_tick_timer(tx: mpsc::UnboundedSender<Message>, interval: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        loop {
            interval.tick().await;
            if tx.send(Message::Input(Event::Tick)).is_err() {
                break;
            }
        }
    });
}

/// Updates application state based on a message.
pub fn update(app: &mut App, replica: &mut OrderBookReplica, message: Message) {
    match message {
        Message::Input(Event::Key(key)) => handle_key(app, key),
        Message::Input(Event::Resize(_, _)) => app.request_redraw(),
        Message::Input(Event::Tick) => app.on_tick(replica, Instant::now()),
        Message::FeedConnected => {
            app.feed_status = FeedStatus::Streaming;
            app.request_redraw();
        }
        Message::FeedClosed(reason) => {
            // Apply whatever the session queued before it ended.
            app.on_tick(replica, Instant::now());
            app.feed_status = FeedStatus::Closed(reason);
            app.request_redraw();
        }
        // Show the complete book now rather than on the next tick.
        Message::BookComplete => app.on_tick(replica, Instant::now()),
        Message::RefreshTimedOut => {
            app.refresh_timed_out = true;
            app.request_redraw();
        }
    }
}

/// Handles a key press.
pub fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Char(c @ '1'..='9') => {
            let column = (c as usize) - ('1' as usize);
            if column < BOOK_COLUMNS.len() {
                app.select_sort_column(column);
            }
        }
        _ => {}
    }
}
