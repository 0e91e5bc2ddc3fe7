//! Incoming message classification.
//!
//! [`FeedAdapter`] turns server frames into replica records without touching
//! the network, so the session loop only has to send whatever replies it
//! returns.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::ReplicaError;
use crate::models::market_by_price::MarketByPriceMessage;
use crate::models::{
    Domain, ErrorMessage, ITEM_STREAM_ID, ItemRequest, LoginResponse, MessageHeader, MessageType,
    StatusMessage,
};
use crate::replica::{FeedHandle, Phase};

/// A message the session must send in response to a server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// The login was accepted; request the instrument.
    ItemRequest(ItemRequest),
    /// Reply to a server ping.
    Pong,
}

/// Classifies server messages and pushes MarketByPrice content onto the
/// replica's ingest queue.
#[derive(Debug)]
pub struct FeedAdapter {
    feed: FeedHandle,
    ric: String,
    logged_in: bool,
    item_closed: bool,
}

impl FeedAdapter {
    pub fn new(feed: FeedHandle, ric: &str) -> Self {
        Self {
            feed,
            ric: ric.to_string(),
            logged_in: false,
            item_closed: false,
        }
    }

    pub fn feed(&self) -> &FeedHandle {
        &self.feed
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Whether the server closed the item stream.
    pub fn item_closed(&self) -> bool {
        self.item_closed
    }

    /// Processes one text frame.
    ///
    /// The server may pack several messages into a single JSON array; each
    /// is handled in order.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaError::MalformedMessage`] if the frame is not JSON.
    /// A message inside the frame that fails to parse is logged and skipped.
    pub fn process_frame(&mut self, text: &str) -> Result<Vec<Outbound>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ReplicaError::MalformedMessage(e.to_string()))?;

        let messages = match value {
            Value::Array(messages) => messages,
            single => vec![single],
        };

        let mut replies = Vec::new();
        for message in messages {
            match self.dispatch_message(message) {
                Ok(Some(reply)) => replies.push(reply),
                Ok(None) => {}
                Err(e) => warn!("Skipping message: {e}"),
            }
        }

        Ok(replies)
    }

    /// Routes one parsed message by its `Type` and `Domain`.
    fn dispatch_message(&mut self, value: Value) -> Result<Option<Outbound>> {
        let header: MessageHeader = serde_json::from_value(value.clone())
            .map_err(|e| ReplicaError::MalformedMessage(format!("missing header: {e}")))?;

        match (header.tpe, header.domain) {
            (MessageType::Refresh, Some(Domain::Login)) => self.handle_login(value),
            (MessageType::Refresh, Some(Domain::MarketByPrice)) => {
                let message = self.parse_market_by_price(value, true)?;
                self.process_market_by_price(message, true);
                Ok(None)
            }
            (MessageType::Update, domain) if domain != Some(Domain::Login) => {
                let message = self.parse_market_by_price(value, false)?;
                self.process_market_by_price(message, false);
                Ok(None)
            }
            (MessageType::Ping, _) => {
                debug!("Received ping");
                Ok(Some(Outbound::Pong))
            }
            (MessageType::Status, _) => {
                self.handle_status(value)?;
                Ok(None)
            }
            (MessageType::Error, _) => {
                let message: ErrorMessage = serde_json::from_value(value)?;
                warn!(id = ?message.id, text = message.text, debug = ?message.debug, "Server error");
                Ok(None)
            }
            (tpe, domain) => {
                debug!(?tpe, ?domain, id = ?header.id, "Ignoring message");
                Ok(None)
            }
        }
    }

    fn handle_login(&mut self, value: Value) -> Result<Option<Outbound>> {
        let response: LoginResponse = serde_json::from_value(value)?;

        if let Some(state) = response.state.as_ref().filter(|s| s.is_closed()) {
            warn!(
                id = response.id,
                stream = state.stream,
                text = ?state.text,
                "Login refused"
            );
            return Ok(None);
        }

        info!(
            id = response.id,
            user = ?response.key.as_ref().map(|k| k.name.as_str()),
            text = ?response.state.as_ref().and_then(|s| s.text.as_deref()),
            "Login accepted"
        );

        if self.logged_in {
            return Ok(None);
        }
        self.logged_in = true;

        Ok(Some(Outbound::ItemRequest(ItemRequest::market_by_price(
            &self.ric,
        ))))
    }

    fn handle_status(&mut self, value: Value) -> Result<()> {
        let status: StatusMessage = serde_json::from_value(value)?;
        let Some(state) = status.state else {
            debug!(id = status.id, "Status without state");
            return Ok(());
        };

        if state.is_closed() && status.id == ITEM_STREAM_ID {
            self.item_closed = true;
        }

        warn!(
            id = status.id,
            domain = ?status.domain,
            stream = state.stream,
            data = state.data,
            code = ?state.code,
            text = ?state.text,
            "Stream status"
        );

        Ok(())
    }

    /// Parses a MarketByPrice message, counting it as malformed on failure.
    ///
    /// An unparseable refresh still records its completeness indicator so
    /// the book cannot stall in progress behind one bad message.
    fn parse_market_by_price(&self, value: Value, refresh: bool) -> Result<MarketByPriceMessage> {
        let complete = value.get("Complete").and_then(Value::as_bool);
        serde_json::from_value(value).map_err(|e| {
            self.feed.record_malformed();
            if refresh {
                let transition = self.feed.mark_refresh(complete);
                warn!(?complete, ?transition, "Unparseable MarketByPrice refresh");
            }
            ReplicaError::MalformedMessage(format!("MarketByPrice message: {e}"))
        })
    }

    /// Pushes a MarketByPrice message onto the ingest queue.
    ///
    /// Entries are queued first, then the summary; for refreshes the
    /// completeness indicator is recorded last so a consumer that sees the
    /// book complete will also find every entry of the final part queued.
    fn process_market_by_price(&mut self, message: MarketByPriceMessage, refresh: bool) {
        let phase = if refresh {
            Phase::Refresh
        } else {
            Phase::Incremental
        };
        let map = message.map.unwrap_or_default();
        let entry_count = map.entries.len();

        for (index, decoded) in map.mutations().enumerate() {
            match decoded {
                Ok(record) => self.feed.push_mutation(phase, record),
                Err(e) => {
                    self.feed.record_malformed();
                    warn!(id = message.id, index, "Skipping map entry: {e}");
                }
            }
        }

        if let Some(summary) = map.summary.filter(|s| !s.fields.is_empty()) {
            self.feed.push_summary(phase, summary.fields);
        }

        if refresh {
            let transition = self.feed.mark_refresh(message.complete);
            debug!(
                id = message.id,
                entries = entry_count,
                complete = ?message.complete,
                ?transition,
                "MarketByPrice refresh"
            );
        } else {
            debug!(id = message.id, entries = entry_count, "MarketByPrice update");
        }
    }
}
