//! Live Market-By-Price order book replica.
//!
//! Consumes incremental add/update/delete mutations from a `tr_json2`
//! WebSocket feed, applies them to a locally consistent replica of the
//! price-level book, and hands batched change sets to a consumer without
//! ever blocking the feed-reading task.

pub mod config;
pub mod error;
pub mod models;
pub mod replica;
pub mod tls;
pub mod tui;
pub mod websocket;

pub use error::{ReplicaError, Result};
pub use replica::{ChangeSet, FeedHandle, OrderBookReplica};
