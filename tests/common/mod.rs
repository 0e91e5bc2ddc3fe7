//! Shared test utilities and constants.

#![allow(dead_code)]

use mbp_replica::replica::Fields;
use serde_json::{Value, json};

/// Default local endpoint of a market data server for live tests.
pub const MBP_WS_URL: &str = "ws://localhost:15000/WebSocket";

pub const LOGIN_REFRESH_JSON: &str = include_str!("../fixtures/login_refresh.json");
pub const REFRESH_PART1_JSON: &str = include_str!("../fixtures/mbp_refresh_part1.json");
pub const REFRESH_PART2_JSON: &str = include_str!("../fixtures/mbp_refresh_part2.json");
pub const UPDATE_JSON: &str = include_str!("../fixtures/mbp_update.json");
pub const STATUS_CLOSED_JSON: &str = include_str!("../fixtures/mbp_status_closed.json");
pub const ERROR_JSON: &str = include_str!("../fixtures/error.json");

/// Converts a JSON object literal into a field map.
pub fn fields(value: Value) -> Fields {
    value
        .as_object()
        .cloned()
        .expect("fields must be a JSON object")
}

/// A complete price level field set.
pub fn level(price: f64, side: &str, size: u64, orders: u64) -> Fields {
    fields(json!({
        "ORDER_PRC": price,
        "ORDER_SIDE": side,
        "ACC_SIZE": size,
        "NO_ORD": orders,
        "LV_TIM_MS": 34_200_000
    }))
}
