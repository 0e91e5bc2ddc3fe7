//! Models for the `tr_json2` WebSocket protocol.
//!
//! Contains the message header used for classification, the login and
//! item requests sent by the client, and the session-level messages
//! (ping/pong, status, error) received from the server.

pub mod market_by_price;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stream id used for the login request.
pub const LOGIN_STREAM_ID: i64 = 1;

/// Stream id used for the MarketByPrice item request.
pub const ITEM_STREAM_ID: i64 = 2;

/// The `Type` of a server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Refresh,
    Update,
    Status,
    Ping,
    Pong,
    Error,
    #[serde(other)]
    Unknown,
}

/// The `Domain` a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Login,
    MarketByPrice,
    #[serde(other)]
    Other,
}

impl Domain {
    /// Returns the wire-format domain name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Login => "Login",
            Domain::MarketByPrice => "MarketByPrice",
            Domain::Other => "Other",
        }
    }
}

/// Routing fields common to every server message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageHeader {
    #[serde(rename = "ID")]
    pub id: Option<i64>,
    #[serde(rename = "Type")]
    pub tpe: MessageType,
    #[serde(rename = "Domain")]
    pub domain: Option<Domain>,
}

/// Stream and data state attached to refresh and status messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamState {
    #[serde(rename = "Stream")]
    pub stream: String,
    #[serde(rename = "Data")]
    pub data: String,
    #[serde(rename = "Code", default)]
    pub code: Option<String>,
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
}

impl StreamState {
    /// Whether the server has closed this stream.
    pub fn is_closed(&self) -> bool {
        self.stream.starts_with("Closed")
    }
}

/// Login refresh acknowledging (or refusing) the session.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Key", default)]
    pub key: Option<LoginResponseKey>,
    #[serde(rename = "State", default)]
    pub state: Option<StreamState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponseKey {
    #[serde(rename = "Name")]
    pub name: String,
}

/// Stream status change, e.g. an item request the server closed.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Domain", default)]
    pub domain: Option<Domain>,
    #[serde(rename = "State", default)]
    pub state: Option<StreamState>,
}

/// Protocol error reported by the server about a client message.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "ID", default)]
    pub id: Option<i64>,
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Debug", default)]
    pub debug: Option<Value>,
}

/// A login request opening the session.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Domain")]
    pub domain: Domain,
    #[serde(rename = "Key")]
    pub key: LoginKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginKey {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Elements")]
    pub elements: LoginElements,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginElements {
    #[serde(rename = "ApplicationId")]
    pub application_id: String,
    #[serde(rename = "Position")]
    pub position: String,
}

impl LoginRequest {
    /// Creates a login request for the given user.
    pub fn new(user: &str, application_id: &str, position: &str) -> Self {
        Self {
            id: LOGIN_STREAM_ID,
            domain: Domain::Login,
            key: LoginKey {
                name: user.to_string(),
                elements: LoginElements {
                    application_id: application_id.to_string(),
                    position: position.to_string(),
                },
            },
        }
    }
}

/// A streaming item request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRequest {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Domain")]
    pub domain: Domain,
    #[serde(rename = "Key")]
    pub key: ItemKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemKey {
    #[serde(rename = "Name")]
    pub name: String,
}

impl ItemRequest {
    /// Creates a MarketByPrice request for one instrument.
    pub fn market_by_price(ric: &str) -> Self {
        Self {
            id: ITEM_STREAM_ID,
            domain: Domain::MarketByPrice,
            key: ItemKey {
                name: ric.to_string(),
            },
        }
    }
}

/// Reply to a server `Ping`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PongMessage {
    #[serde(rename = "Type")]
    pub tpe: MessageType,
}

impl PongMessage {
    pub fn new() -> Self {
        Self {
            tpe: MessageType::Pong,
        }
    }
}

impl Default for PongMessage {
    fn default() -> Self {
        Self::new()
    }
}
