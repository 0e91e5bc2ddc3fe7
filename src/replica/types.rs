//! Entry, key and mutation types shared by the replica components.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name to value mapping carried by entries and summary updates.
pub type Fields = serde_json::Map<String, Value>;

/// Well-known MarketByPrice field names.
pub mod field {
    pub const ORDER_PRC: &str = "ORDER_PRC";
    pub const ORDER_SIDE: &str = "ORDER_SIDE";
    pub const ACC_SIZE: &str = "ACC_SIZE";
    pub const NO_ORD: &str = "NO_ORD";
    pub const LV_TIM_MS: &str = "LV_TIM_MS";

    pub const DSPLY_NAME: &str = "DSPLY_NAME";
    pub const CURRENCY: &str = "CURRENCY";
    pub const TIMACT_MS: &str = "TIMACT_MS";
    pub const SEQNUM: &str = "SEQNUM";
    pub const RDN_EXCHD2: &str = "RDN_EXCHD2";
}

/// Identifier of one price level (decoded price + side, e.g. `"10.5|BID"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntryKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for EntryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// The action a mutation performs on its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    Add,
    Update,
    Delete,
}

impl MutationKind {
    /// Returns the wire name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Add => "Add",
            MutationKind::Update => "Update",
            MutationKind::Delete => "Delete",
        }
    }

    /// Whether records of this kind must carry a field set.
    pub fn requires_fields(&self) -> bool {
        !matches!(self, MutationKind::Delete)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One add/update/delete event for one entry key.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub key: EntryKey,
    pub kind: MutationKind,
    /// Complete field set for `Add`/`Update`; ignored for `Delete`.
    pub fields: Option<Fields>,
}

impl MutationRecord {
    pub fn new(key: impl Into<EntryKey>, kind: MutationKind, fields: Option<Fields>) -> Self {
        Self {
            key: key.into(),
            kind,
            fields,
        }
    }

    pub fn add(key: impl Into<EntryKey>, fields: Fields) -> Self {
        Self::new(key, MutationKind::Add, Some(fields))
    }

    pub fn update(key: impl Into<EntryKey>, fields: Fields) -> Self {
        Self::new(key, MutationKind::Update, Some(fields))
    }

    pub fn delete(key: impl Into<EntryKey>) -> Self {
        Self::new(key, MutationKind::Delete, None)
    }
}

/// A live price level held by the replica.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: EntryKey,
    pub fields: Fields,
}

impl Entry {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn price(&self) -> Option<Decimal> {
        self.field(field::ORDER_PRC).and_then(value_to_decimal)
    }

    pub fn side(&self) -> Option<&str> {
        self.field(field::ORDER_SIDE).and_then(Value::as_str)
    }

    /// Aggregated size at this level.
    pub fn size(&self) -> Option<Decimal> {
        self.field(field::ACC_SIZE).and_then(value_to_decimal)
    }

    pub fn order_count(&self) -> Option<u64> {
        self.field(field::NO_ORD).and_then(value_to_u64)
    }

    /// Last update time in milliseconds since midnight.
    pub fn last_update_ms(&self) -> Option<u64> {
        self.field(field::LV_TIM_MS).and_then(value_to_u64)
    }

    /// Field value formatted for display; strings are shown unquoted.
    pub fn display_field(&self, name: &str) -> String {
        self.field(name).map(display_value).unwrap_or_default()
    }
}

/// Formats a field value for display without JSON quoting.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads a numeric field that may arrive as a JSON number or a string.
pub fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
