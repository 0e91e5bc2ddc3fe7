//! Feed adapter tests: recorded server frames driven through the adapter
//! into a replica, without a network connection.

mod common;

use rust_decimal_macros::dec;
use serde_json::json;

use mbp_replica::models::ItemRequest;
use mbp_replica::models::market_by_price::encode_key;
use mbp_replica::replica::{OrderBookReplica, ReplicaOptions};
use mbp_replica::websocket::{FeedAdapter, Outbound};

use common::{
    ERROR_JSON, LOGIN_REFRESH_JSON, REFRESH_PART1_JSON, REFRESH_PART2_JSON, STATUS_CLOSED_JSON,
    UPDATE_JSON,
};

fn adapter() -> (OrderBookReplica, FeedAdapter) {
    let (replica, feed) = OrderBookReplica::new(ReplicaOptions::default());
    (replica, FeedAdapter::new(feed, "VOD.L"))
}

#[test]
fn test_login_refresh_requests_item_once() {
    let (_replica, mut adapter) = adapter();

    let replies = adapter.process_frame(LOGIN_REFRESH_JSON).expect("frame");
    assert_eq!(
        replies,
        [Outbound::ItemRequest(ItemRequest::market_by_price("VOD.L"))]
    );
    assert!(adapter.is_logged_in());

    let replies = adapter.process_frame(LOGIN_REFRESH_JSON).expect("frame");
    assert!(replies.is_empty());
}

#[test]
fn test_multipart_refresh_completes_book() {
    let (mut replica, mut adapter) = adapter();

    adapter.process_frame(REFRESH_PART1_JSON).expect("part 1");
    assert!(!adapter.feed().is_complete());
    let cs = replica.drain_and_apply();
    assert!(!cs.book_complete);
    assert_eq!(cs.entry_count, 2);
    assert_eq!(cs.summary["CURRENCY"], json!("GBp"));

    adapter.process_frame(REFRESH_PART2_JSON).expect("part 2");
    assert!(adapter.feed().is_complete());
    let cs = replica.drain_and_apply();
    assert!(cs.book_complete);
    assert_eq!(cs.entry_count, 4);
    assert!(cs.anomalies.is_clean());
}

#[test]
fn test_update_frame_applies_and_answers_ping() {
    let (mut replica, mut adapter) = adapter();
    adapter.process_frame(REFRESH_PART1_JSON).expect("part 1");
    adapter.process_frame(REFRESH_PART2_JSON).expect("part 2");
    replica.drain_and_apply();

    let replies = adapter.process_frame(UPDATE_JSON).expect("update");
    assert_eq!(replies, [Outbound::Pong]);

    let cs = replica.drain_and_apply();
    assert_eq!(cs.changes.len(), 3);
    assert_eq!(cs.entry_count, 4);
    assert_eq!(cs.touched_summary, ["SEQNUM", "TIMACT_MS"]);
    assert_eq!(cs.summary["SEQNUM"], json!(102));
    assert_eq!(cs.summary["DSPLY_NAME"], json!("VODAFONE GROUP"));

    let bid = replica.get("10.5|BID").expect("bid level");
    assert_eq!(bid.size(), Some(dec!(150)));
    assert_eq!(bid.order_count(), Some(4));
    assert!(replica.get("10.7|ASK").is_none());
    assert_eq!(replica.get("10.8|ASK").and_then(|e| e.price()), Some(dec!(10.8)));
}

#[test]
fn test_status_closed_marks_item_closed() {
    let (_replica, mut adapter) = adapter();

    let replies = adapter.process_frame(STATUS_CLOSED_JSON).expect("status");
    assert!(replies.is_empty());
    assert!(adapter.item_closed());
}

#[test]
fn test_error_frame_is_logged_not_fatal() {
    let (mut replica, mut adapter) = adapter();

    let replies = adapter.process_frame(ERROR_JSON).expect("error");
    assert!(replies.is_empty());
    assert!(replica.drain_and_apply().is_empty());
}

#[test]
fn test_non_json_frame_is_rejected() {
    let (_replica, mut adapter) = adapter();
    assert!(adapter.process_frame("not json").is_err());
}

#[test]
fn test_undecodable_entry_is_counted_and_skipped() {
    let (mut replica, mut adapter) = adapter();
    let frame = json!({
        "ID": 2,
        "Type": "Update",
        "Domain": "MarketByPrice",
        "Map": {
            "Entries": [
                {"Action": "Add", "Key": "%%%", "Fields": {"ACC_SIZE": 1}},
                {"Action": "Add", "Key": encode_key("9.9|BID"), "Fields": {"ACC_SIZE": 5}}
            ]
        }
    });

    adapter.process_frame(&frame.to_string()).expect("frame");
    let cs = replica.drain_and_apply();

    assert_eq!(cs.changes.len(), 1);
    assert_eq!(cs.anomalies.malformed, 1);
    assert!(replica.get("9.9|BID").is_some());
}

#[test]
fn test_refresh_without_complete_field_completes_book() {
    let (replica, mut adapter) = adapter();

    adapter.process_frame(REFRESH_PART2_JSON).expect("refresh");
    assert!(replica.is_complete());
}

#[test]
fn test_refresh_with_keyless_entry_keeps_good_entries_and_completes() {
    let (mut replica, mut adapter) = adapter();
    let frame = json!([{
        "ID": 2,
        "Type": "Refresh",
        "Domain": "MarketByPrice",
        "Map": {
            "Entries": [
                {"Action": "Add", "Key": encode_key("10.5|BID"), "Fields": {"ACC_SIZE": 100}},
                {"Action": "Add", "Fields": {"ACC_SIZE": 7}},
                {"Action": "Add", "Key": encode_key("10.6|ASK"), "Fields": {"ACC_SIZE": 250}}
            ]
        }
    }]);

    adapter.process_frame(&frame.to_string()).expect("frame");
    let cs = replica.drain_and_apply();

    assert_eq!(cs.entry_count, 2);
    assert!(cs.book_complete);
    assert_eq!(cs.anomalies.malformed, 1);
    assert!(replica.get("10.6|ASK").is_some());
}

#[test]
fn test_entry_with_non_object_fields_is_counted() {
    let (mut replica, mut adapter) = adapter();
    let frame = json!({
        "ID": 2,
        "Type": "Update",
        "Domain": "MarketByPrice",
        "Map": {
            "Entries": [
                {"Action": "Update", "Key": encode_key("1|BID"), "Fields": "oops"},
                {"Key": encode_key("2|BID"), "Fields": {"ACC_SIZE": 1}},
                {"Action": "Add", "Key": encode_key("3|ASK"), "Fields": {"ACC_SIZE": 3}}
            ]
        }
    });

    adapter.process_frame(&frame.to_string()).expect("frame");
    let cs = replica.drain_and_apply();

    assert_eq!(cs.changes.len(), 1);
    assert_eq!(cs.anomalies.malformed, 2);
}

#[test]
fn test_unparseable_final_refresh_still_completes_book() {
    let (mut replica, mut adapter) = adapter();
    adapter.process_frame(REFRESH_PART1_JSON).expect("part 1");

    // No ID and a non-object map: the message itself cannot be parsed.
    let frame = json!({"Type": "Refresh", "Domain": "MarketByPrice", "Map": 3});
    adapter.process_frame(&frame.to_string()).expect("frame");

    let cs = replica.drain_and_apply();
    assert!(cs.book_complete);
    assert_eq!(cs.entry_count, 2);
    assert_eq!(cs.anomalies.malformed, 1);
}
