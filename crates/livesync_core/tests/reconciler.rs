//! Integration tests for the reconciler, store and change feed.

use std::sync::Arc;

use livesync_codec::{DomainValue, RowKey};
use livesync_core::{
    ChangeEvent, ChangeKind, ClientConfig, Reconciler, ServerMessage, SyncError, TableUpdate,
};
use livesync_testkit::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};

fn keyed() -> Reconciler {
    Reconciler::new(simple_schema(), ClientConfig::new().with_primary_key("Message", "id")).unwrap()
}

fn keyless() -> Reconciler {
    Reconciler::new(simple_schema(), ClientConfig::new()).unwrap()
}

fn update(table: &str, ops: Vec<Value>) -> TableUpdate {
    serde_json::from_value(table_update(table, ops)).unwrap()
}

fn record(reconciler: &Reconciler) -> Arc<Mutex<Vec<ChangeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = reconciler
        .feed()
        .on_change(None, move |e| sink.lock().push(e.clone()));
    events
}

fn text(value: &Option<Arc<DomainValue>>) -> Option<&str> {
    value.as_deref().and_then(|v| v.get("text")).and_then(DomainValue::as_str)
}

#[test]
fn keyless_insert_then_delete_nets_to_empty() {
    let reconciler = keyless();
    let events = record(&reconciler);
    let row = message_row(1, "hello");

    reconciler
        .apply(&[update("Message", vec![insert_op(row.clone())])])
        .unwrap();
    assert_eq!(reconciler.store().count("Message"), 1);

    reconciler
        .apply(&[update("Message", vec![delete_op(row)])])
        .unwrap();
    assert_eq!(reconciler.store().count("Message"), 0);

    let events = events.lock();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Delete]);
    assert_eq!(text(&events[1].old_value), Some("hello"));
    assert!(events[1].new_value.is_none());
}

#[test]
fn keyless_delete_and_insert_stay_separate() {
    let reconciler = keyless();
    reconciler
        .apply(&[update("Message", vec![insert_op(message_row(5, "old"))])])
        .unwrap();

    let summary = reconciler
        .apply(&[update(
            "Message",
            vec![delete_op(message_row(5, "old")), insert_op(message_row(5, "new"))],
        )])
        .unwrap();

    assert_eq!((summary.inserts, summary.updates, summary.deletes), (1, 0, 1));
    assert_eq!(reconciler.store().count("Message"), 1);
}

#[test]
fn keyed_delete_insert_becomes_update() {
    let reconciler = keyed();
    reconciler
        .apply(&[update("Message", vec![insert_op(message_row(5, "old"))])])
        .unwrap();
    let events = record(&reconciler);

    let summary = reconciler
        .apply(&[update(
            "Message",
            vec![delete_op(message_row(5, "old")), insert_op(message_row(5, "new"))],
        )])
        .unwrap();
    assert_eq!(summary.events(), 1);
    assert_eq!(summary.updates, 1);

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Update);
    assert_eq!(text(&events[0].old_value), Some("old"));
    assert_eq!(text(&events[0].new_value), Some("new"));

    let store = reconciler.store();
    assert_eq!(store.count("Message"), 1);
    let key = RowKey::from_raw(&json!(5));
    assert_eq!(events[0].new_key.as_ref(), Some(&key));
    let row = store.get("Message", &key).unwrap();
    assert_eq!(row.get("text").and_then(DomainValue::as_str), Some("new"));
}

#[test]
fn keyed_insert_before_delete_in_batch_still_pairs() {
    let reconciler = keyed();
    reconciler
        .apply(&[update("Message", vec![insert_op(message_row(5, "old"))])])
        .unwrap();

    let summary = reconciler
        .apply(&[update(
            "Message",
            vec![insert_op(message_row(5, "new")), delete_op(message_row(5, "old"))],
        )])
        .unwrap();
    assert_eq!(summary.updates, 1);
    assert_eq!(summary.deletes, 0);
}

#[test]
fn update_of_unseen_row_uses_delete_content() {
    let reconciler = keyed();
    let events = record(&reconciler);

    reconciler
        .apply(&[update(
            "Message",
            vec![delete_op(message_row(9, "before")), insert_op(message_row(9, "after"))],
        )])
        .unwrap();

    let events = events.lock();
    assert_eq!(events[0].kind, ChangeKind::Update);
    assert_eq!(text(&events[0].old_value), Some("before"));
}

#[test]
fn delete_of_unseen_row_is_tolerated() {
    let reconciler = keyed();
    let events = record(&reconciler);

    let summary = reconciler
        .apply(&[update("Message", vec![delete_op(message_row(3, "ghost"))])])
        .unwrap();
    assert_eq!(summary.deletes, 1);

    let events = events.lock();
    assert_eq!(events[0].kind, ChangeKind::Delete);
    assert!(events[0].old_value.is_none());
}

#[test]
fn events_follow_insert_order_then_deletes() {
    let reconciler = keyed();
    reconciler
        .apply(&[update(
            "Message",
            vec![insert_op(message_row(1, "a")), insert_op(message_row(2, "b"))],
        )])
        .unwrap();
    let events = record(&reconciler);

    reconciler
        .apply(&[update(
            "Message",
            vec![
                delete_op(message_row(1, "a")),
                delete_op(message_row(2, "b")),
                insert_op(message_row(3, "c")),
                insert_op(message_row(2, "B")),
            ],
        )])
        .unwrap();

    let events = events.lock();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
    );
    assert_eq!(text(&events[0].new_value), Some("c"));
    assert_eq!(text(&events[1].new_value), Some("B"));
    assert_eq!(text(&events[2].old_value), Some("a"));
    assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

#[test]
fn duplicate_deletes_pair_first_in_order() {
    let reconciler = keyed();
    let events = record(&reconciler);

    reconciler
        .apply(&[update(
            "Message",
            vec![
                delete_op(message_row(5, "first")),
                delete_op(message_row(5, "second")),
                insert_op(message_row(5, "new")),
            ],
        )])
        .unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, ChangeKind::Update);
    assert_eq!(text(&events[0].old_value), Some("first"));
    // The leftover delete shares the key and removes the row just written.
    assert_eq!(events[1].kind, ChangeKind::Delete);
    assert_eq!(text(&events[1].old_value), Some("new"));
    assert_eq!(reconciler.store().count("Message"), 0);
}

#[test]
fn duplicate_inserts_pair_first_in_order() {
    let reconciler = keyed();
    let events = record(&reconciler);

    reconciler
        .apply(&[update(
            "Message",
            vec![
                delete_op(message_row(5, "old")),
                insert_op(message_row(5, "one")),
                insert_op(message_row(5, "two")),
            ],
        )])
        .unwrap();

    let events = events.lock();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Update, ChangeKind::Insert]);
    assert_eq!(text(&events[0].new_value), Some("one"));

    let row = reconciler
        .store()
        .get("Message", &RowKey::from_raw(&json!(5)))
        .unwrap();
    assert_eq!(row.get("text").and_then(DomainValue::as_str), Some("two"));
}

#[test]
fn decode_failure_aborts_only_the_failing_table() {
    let reconciler = keyed();
    reconciler
        .apply(&[update("Message", vec![insert_op(message_row(1, "kept"))])])
        .unwrap();
    let events = record(&reconciler);

    let err = reconciler
        .apply(&[
            update("Log", vec![insert_op(json!(["first table"]))]),
            update(
                "Message",
                vec![insert_op(message_row(2, "fine")), insert_op(json!(["not a number", "x"]))],
            ),
        ])
        .unwrap_err();

    assert!(matches!(err, SyncError::Decode { ref table, .. } if table == "Message"));
    assert!(!err.is_schema_error());
    // Earlier table kept its change; the failing table is untouched.
    assert_eq!(reconciler.store().count("Log"), 1);
    assert_eq!(reconciler.store().count("Message"), 1);
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].table, "Log");
}

#[test]
fn listeners_see_the_updated_store() {
    let reconciler = Arc::new(keyed());
    let seen = Arc::new(Mutex::new(None));

    let (store, sink) = (Arc::clone(reconciler.store()), Arc::clone(&seen));
    let _sub = reconciler.feed().on_insert(Some("Message"), move |_| {
        *sink.lock() = Some(store.count("Message"));
    });

    reconciler
        .apply(&[update("Message", vec![insert_op(message_row(1, "a"))])])
        .unwrap();
    assert_eq!(*seen.lock(), Some(1));
}

#[test]
fn initial_subscription_replaces_and_signals_refetch() {
    let reconciler = keyed();
    reconciler
        .apply(&[update("Message", vec![insert_op(message_row(1, "stale"))])])
        .unwrap();
    let events = record(&reconciler);

    let summary = reconciler
        .apply_initial(&[update(
            "Message",
            vec![insert_op(message_row(2, "a")), insert_op(message_row(3, "b"))],
        )])
        .unwrap();

    assert_eq!(summary.tables, 1);
    assert_eq!(summary.inserts, 2);
    assert_eq!(reconciler.store().count("Message"), 2);
    assert!(!reconciler
        .store()
        .contains("Message", &RowKey::from_raw(&json!(1))));

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Refetch);
    assert_eq!(events[0].table, "Message");
}

#[test]
fn apply_message_routes_by_tag() {
    let reconciler = keyed();

    let initial = ServerMessage::from_value(subscription_update(vec![table_update(
        "Message",
        vec![insert_op(message_row(1, "a"))],
    )]))
    .unwrap();
    reconciler.apply_message(&initial).unwrap();

    let summary = reconciler
        .apply_json(
            &transaction_update(vec![table_update(
                "Message",
                vec![delete_op(message_row(1, "a")), insert_op(message_row(1, "b"))],
            )])
            .to_string(),
        )
        .unwrap();
    assert_eq!(summary.updates, 1);

    let summary = reconciler
        .apply_json(r#"{"IdentityToken": {"identity": "00", "token": "t"}}"#)
        .unwrap();
    assert_eq!(summary.events(), 0);

    assert!(matches!(
        reconciler.apply_json(r#"{"Bogus": {}}"#),
        Err(SyncError::Message { .. })
    ));
}

#[test]
fn unknown_tables_are_skipped_unless_strict() {
    let lenient = keyless();
    let summary = lenient
        .apply(&[update("Nope", vec![insert_op(json!([1]))])])
        .unwrap();
    assert_eq!(summary.tables, 0);

    let strict = Reconciler::new(simple_schema(), ClientConfig::new().strict_tables(true)).unwrap();
    let err = strict
        .apply(&[update("Nope", vec![insert_op(json!([1]))])])
        .unwrap_err();
    assert!(err.is_schema_error());
}

#[test]
fn reducers_cannot_carry_rows() {
    let reconciler = Reconciler::new(chat_schema(), ClientConfig::new()).unwrap();
    let err = reconciler
        .apply(&[update("send_message", vec![insert_op(json!(["hi"]))])])
        .unwrap_err();
    assert!(matches!(err, SyncError::SchemaConfig { .. }));
}

#[test]
fn bad_primary_key_config_is_rejected() {
    for config in [
        ClientConfig::new().with_primary_key("Nope", "id"),
        ClientConfig::new().with_primary_key("Message", "missing"),
    ] {
        let err = Reconciler::new(simple_schema(), config).unwrap_err();
        assert!(matches!(err, SyncError::SchemaConfig { .. }));
    }
    let chat = ClientConfig::new().with_primary_key("set_name", "name");
    assert!(Reconciler::new(chat_schema(), chat).is_err());
}

#[test]
fn chat_user_keyed_by_identity() {
    let reconciler = Reconciler::new(
        chat_schema(),
        ClientConfig::new().with_primary_key("User", "identity"),
    )
    .unwrap();
    let events = record(&reconciler);

    reconciler
        .apply(&[
            update("User", vec![insert_op(user_row(1, Some("alice"), true))]),
            update("Message", vec![insert_op(chat_message_row(1, 1_700_000_000, "hi"))]),
        ])
        .unwrap();
    reconciler
        .apply(&[update(
            "User",
            vec![
                delete_op(user_row(1, Some("alice"), true)),
                insert_op(user_row(1, Some("alice"), false)),
            ],
        )])
        .unwrap();

    let events = events.lock();
    let last = events.last().unwrap();
    assert_eq!(last.kind, ChangeKind::Update);
    assert_eq!(
        last.new_value.as_deref().and_then(|u| u.get("online")),
        Some(&DomainValue::Bool(false))
    );
    assert_eq!(reconciler.store().count("User"), 1);
    assert_eq!(
        reconciler.row_key("User", &user_row(1, None, true)).unwrap(),
        RowKey::from_raw(&json!([identity_hex(1)]))
    );
}

#[test]
fn feed_history_follows_config() {
    let reconciler = Reconciler::new(simple_schema(), ClientConfig::new().max_history(2)).unwrap();
    let ops = (0..5).map(|i| insert_op(message_row(i, "x"))).collect();
    reconciler.apply(&[update("Log", vec![]), update("Message", ops)]).unwrap();

    assert_eq!(reconciler.feed().history_len(), 2);
    assert_eq!(reconciler.feed().latest_sequence(), 5);
}

proptest! {
    #[test]
    fn keyless_insert_delete_nets_out(rows in prop::collection::vec(message_row_strategy(1000), 1..20)) {
        let reconciler = keyless();
        let events = record(&reconciler);

        let inserts = rows.iter().cloned().map(insert_op).collect();
        reconciler.apply(&[update("Message", inserts)]).unwrap();
        let deletes = rows.iter().cloned().map(delete_op).collect();
        reconciler.apply(&[update("Message", deletes)]).unwrap();

        prop_assert_eq!(reconciler.store().count("Message"), 0);
        let events = events.lock();
        let inserts = events.iter().filter(|e| e.kind == ChangeKind::Insert).count();
        let deletes = events.iter().filter(|e| e.kind == ChangeKind::Delete).count();
        prop_assert_eq!(inserts, rows.len());
        prop_assert_eq!(deletes, rows.len());
    }
}
