//! MarketByPrice refresh and update payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;

use crate::replica::{EntryKey, Fields, MutationKind, MutationRecord};

/// A MarketByPrice `Refresh` or `Update` message.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketByPriceMessage {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Type")]
    pub tpe: super::MessageType,
    /// Present on refreshes; `false` marks a non-final part of a
    /// multi-part refresh. Absent means the message is the final part.
    #[serde(rename = "Complete", default)]
    pub complete: Option<bool>,
    #[serde(rename = "Map", default)]
    pub map: Option<MapPayload>,
    #[serde(rename = "State", default)]
    pub state: Option<super::StreamState>,
}

/// The order book map carried by a MarketByPrice message.
///
/// Entries stay as raw JSON until [`MapPayload::map_entries`] decodes them
/// one at a time, so a single bad entry cannot fail the whole message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapPayload {
    #[serde(rename = "Entries", default)]
    pub entries: Vec<Value>,
    #[serde(rename = "Summary", default)]
    pub summary: Option<SummaryPayload>,
}

impl MapPayload {
    /// Decodes each entry independently, in wire order.
    pub fn map_entries(&self) -> impl Iterator<Item = Result<MapEntry, EntryDecodeError>> + '_ {
        self.entries.iter().map(|raw| {
            MapEntry::deserialize(raw).map_err(|e| EntryDecodeError::Shape(e.to_string()))
        })
    }

    /// Decodes each entry into a mutation record, in wire order.
    pub fn mutations(&self) -> impl Iterator<Item = Result<MutationRecord, EntryDecodeError>> + '_ {
        self.map_entries()
            .map(|entry| entry.and_then(|e| e.to_mutation()))
    }
}

/// Book-level fields sent alongside the map entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryPayload {
    #[serde(rename = "Fields", default)]
    pub fields: Fields,
}

/// Action applied by one map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MapAction {
    Add,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

impl MapAction {
    pub fn mutation_kind(&self) -> Option<MutationKind> {
        match self {
            MapAction::Add => Some(MutationKind::Add),
            MapAction::Update => Some(MutationKind::Update),
            MapAction::Delete => Some(MutationKind::Delete),
            MapAction::Unknown => None,
        }
    }
}

/// One price level mutation inside a map.
#[derive(Debug, Clone, Deserialize)]
pub struct MapEntry {
    #[serde(rename = "Action")]
    pub action: MapAction,
    /// Base64 encoded key (ASCII price and side).
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Fields", default)]
    pub fields: Option<Fields>,
}

/// Reasons a map entry cannot become a mutation record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryDecodeError {
    #[error("malformed map entry: {0}")]
    Shape(String),
    #[error("key is not valid base64: {0}")]
    KeyEncoding(String),
    #[error("decoded key is not ASCII")]
    KeyNotAscii,
    #[error("unknown map action")]
    UnknownAction,
}

impl MapEntry {
    /// Decodes the base64 key into its readable form.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not base64 or does not decode to ASCII.
    pub fn decode_key(&self) -> Result<EntryKey, EntryDecodeError> {
        let bytes = STANDARD
            .decode(self.key.as_bytes())
            .map_err(|e| EntryDecodeError::KeyEncoding(e.to_string()))?;
        if !bytes.is_ascii() {
            return Err(EntryDecodeError::KeyNotAscii);
        }
        String::from_utf8(bytes)
            .map(EntryKey::from)
            .map_err(|_| EntryDecodeError::KeyNotAscii)
    }

    /// Converts the entry into a mutation record.
    ///
    /// Field presence is not checked here; a record missing its fields is
    /// rejected and counted when applied.
    ///
    /// # Errors
    ///
    /// Returns an error for an undecodable key or unknown action.
    pub fn to_mutation(&self) -> Result<MutationRecord, EntryDecodeError> {
        let kind = self
            .action
            .mutation_kind()
            .ok_or(EntryDecodeError::UnknownAction)?;
        let key = self.decode_key()?;
        let fields = match kind {
            MutationKind::Delete => None,
            _ => self.fields.clone(),
        };

        Ok(MutationRecord::new(key, kind, fields))
    }
}

/// Base64 encodes a readable key the way the feed does.
pub fn encode_key(key: &str) -> String {
    STANDARD.encode(key.as_bytes())
}
