use geomesh_engine::slot::{self, RawSlot};
use geomesh_engine::{EngineDriver, EngineError, MockConfig, MockEngine, MAP_OPT_EXCLUSIVE};
use geomesh_types::{HandleId, SessionId, Value, LOCAL_ID_LEN};
use std::sync::Mutex;

/// Deliveries recorded by the test trampoline, keyed by handle so parallel
/// tests sharing the process-wide recorder stay independent.
static DELIVERIES: Mutex<Vec<(HandleId, String, Value)>> = Mutex::new(Vec::new());

fn recording_trampoline(handle: HandleId, channel: &str, value: &RawSlot) {
    DELIVERIES
        .lock()
        .unwrap()
        .push((handle, channel.to_string(), slot::decode(value)));
}

fn deliveries_for(handle: HandleId) -> Vec<(String, Value)> {
    DELIVERIES
        .lock()
        .unwrap()
        .iter()
        .filter(|(h, _, _)| *h == handle)
        .map(|(_, c, v)| (c.clone(), v.clone()))
        .collect()
}

fn connected_session(engine: &MockEngine) -> SessionId {
    let session = engine.open_session(recording_trampoline).unwrap();
    engine.connect(session, "ws://seed.test:8080/mesh", "").unwrap();
    session
}

// ── Sessions ─────────────────────────────────────────────────────

#[test]
fn refuse_open_fails_allocation() {
    let engine = MockEngine::with_config(MockConfig {
        refuse_open: true,
        ..Default::default()
    });
    assert!(matches!(
        engine.open_session(recording_trampoline),
        Err(EngineError::Alloc)
    ));
}

#[test]
fn connect_assigns_fixed_width_local_id() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let id = engine.local_id(session).unwrap();
    assert_eq!(id.as_str().len(), LOCAL_ID_LEN);
}

#[test]
fn local_id_before_connect_is_offline() {
    let engine = MockEngine::new();
    let session = engine.open_session(recording_trampoline).unwrap();
    assert!(matches!(
        engine.local_id(session),
        Err(EngineError::Offline)
    ));
}

#[test]
fn refuse_connect_then_retry_succeeds() {
    let engine = MockEngine::new();
    let session = engine.open_session(recording_trampoline).unwrap();
    engine.set_refuse_connect(true);
    assert!(matches!(
        engine.connect(session, "ws://seed.test/mesh", ""),
        Err(EngineError::ConnectRefused(_))
    ));
    engine.set_refuse_connect(false);
    engine.connect(session, "ws://seed.test/mesh", "").unwrap();
}

#[test]
fn connect_rejects_schemeless_url() {
    let engine = MockEngine::new();
    let session = engine.open_session(recording_trampoline).unwrap();
    assert!(matches!(
        engine.connect(session, "not-a-url", ""),
        Err(EngineError::ConnectRefused(_))
    ));
}

#[test]
fn close_session_is_not_idempotent() {
    let engine = MockEngine::new();
    let session = engine.open_session(recording_trampoline).unwrap();
    engine.close_session(session).unwrap();
    assert!(matches!(
        engine.close_session(session),
        Err(EngineError::UnknownSession)
    ));
}

// ── Replicated map ───────────────────────────────────────────────

#[test]
fn map_set_then_get_round_trips() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let map = engine.map_open(session, "m").unwrap();

    let key = slot::encode(&Value::from("k"));
    let value = slot::encode(&Value::Int(42));
    engine.map_set(map, &key, &value, 0).unwrap();

    let mut out = RawSlot::null();
    engine.map_get(map, &key, &mut out).unwrap();
    assert_eq!(slot::decode(&out), Value::Int(42));
}

#[test]
fn map_get_missing_key_is_not_found() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let map = engine.map_open(session, "m").unwrap();

    let key = slot::encode(&Value::from("absent"));
    let mut out = RawSlot::null();
    assert!(matches!(
        engine.map_get(map, &key, &mut out),
        Err(EngineError::NotFound)
    ));
}

#[test]
fn exclusive_set_conflicts_on_existing_key() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let map = engine.map_open(session, "m").unwrap();

    let key = slot::encode(&Value::from("k"));
    let first = slot::encode(&Value::Int(1));
    let second = slot::encode(&Value::Int(2));
    engine.map_set(map, &key, &first, MAP_OPT_EXCLUSIVE).unwrap();
    assert!(matches!(
        engine.map_set(map, &key, &second, MAP_OPT_EXCLUSIVE),
        Err(EngineError::Conflict(_))
    ));
}

#[test]
fn int_and_double_keys_stay_distinct() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let map = engine.map_open(session, "m").unwrap();

    let int_key = slot::encode(&Value::Int(1));
    let double_key = slot::encode(&Value::Double(1.0));
    let a = slot::encode(&Value::from("int"));
    let b = slot::encode(&Value::from("double"));
    engine.map_set(map, &int_key, &a, 0).unwrap();
    engine.map_set(map, &double_key, &b, 0).unwrap();

    let mut out = RawSlot::null();
    engine.map_get(map, &int_key, &mut out).unwrap();
    assert_eq!(slot::decode(&out), Value::from("int"));
}

#[test]
fn sessions_on_one_engine_share_the_map() {
    let engine = MockEngine::new();
    let writer = connected_session(&engine);
    let reader = connected_session(&engine);
    let writer_map = engine.map_open(writer, "shared").unwrap();
    let reader_map = engine.map_open(reader, "shared").unwrap();

    let key = slot::encode(&Value::from("k"));
    let value = slot::encode(&Value::from("v"));
    engine.map_set(writer_map, &key, &value, 0).unwrap();

    let mut out = RawSlot::null();
    engine.map_get(reader_map, &key, &mut out).unwrap();
    assert_eq!(slot::decode(&out), Value::from("v"));
}

// ── Pubsub ───────────────────────────────────────────────────────

#[test]
fn publish_reaches_subscriber_within_radius() {
    let engine = MockEngine::new();
    let publisher = connected_session(&engine);
    let subscriber = connected_session(&engine);
    let pub_handle = engine.pubsub_open(publisher, "p").unwrap();
    let sub_handle = engine.pubsub_open(subscriber, "p").unwrap();

    engine.subscribe(sub_handle, "chan").unwrap();
    let payload = slot::encode(&Value::from("hello"));
    engine
        .publish(pub_handle, "chan", 0.0, 0.0, 10.0, &payload, 0)
        .unwrap();

    assert_eq!(
        deliveries_for(sub_handle),
        vec![("chan".to_string(), Value::from("hello"))]
    );
}

#[test]
fn publish_skips_subscriber_outside_radius() {
    let engine = MockEngine::new();
    let publisher = connected_session(&engine);
    let subscriber = connected_session(&engine);
    engine.set_position(subscriber, 100.0, 100.0).unwrap();
    let pub_handle = engine.pubsub_open(publisher, "p").unwrap();
    let sub_handle = engine.pubsub_open(subscriber, "p").unwrap();

    engine.subscribe(sub_handle, "chan").unwrap();
    let payload = slot::encode(&Value::from("hello"));
    engine
        .publish(pub_handle, "chan", 0.0, 0.0, 10.0, &payload, 0)
        .unwrap();

    assert!(deliveries_for(sub_handle).is_empty());
}

#[test]
fn publish_on_other_channel_is_not_delivered() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let handle = engine.pubsub_open(session, "p").unwrap();

    engine.subscribe(handle, "a").unwrap();
    let payload = slot::encode(&Value::from("x"));
    engine.publish(handle, "b", 0.0, 0.0, 10.0, &payload, 0).unwrap();

    assert!(deliveries_for(handle).is_empty());
}

#[test]
fn unsubscribe_stops_delivery() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let handle = engine.pubsub_open(session, "p").unwrap();

    engine.subscribe(handle, "chan").unwrap();
    engine.unsubscribe(handle, "chan").unwrap();
    let payload = slot::encode(&Value::from("x"));
    engine
        .publish(handle, "chan", 0.0, 0.0, 10.0, &payload, 0)
        .unwrap();

    assert!(deliveries_for(handle).is_empty());
}

#[test]
fn unroutable_publish_reports_no_route() {
    let engine = MockEngine::new();
    let session = connected_session(&engine);
    let handle = engine.pubsub_open(session, "p").unwrap();
    engine.set_unroutable_publish(true);

    let payload = slot::encode(&Value::from("x"));
    assert!(matches!(
        engine.publish(handle, "chan", 0.0, 0.0, 10.0, &payload, 0),
        Err(EngineError::Unroutable(_))
    ));
}

#[test]
fn disconnect_drops_subscriptions() {
    let engine = MockEngine::new();
    let publisher = connected_session(&engine);
    let subscriber = connected_session(&engine);
    let pub_handle = engine.pubsub_open(publisher, "p").unwrap();
    let sub_handle = engine.pubsub_open(subscriber, "p").unwrap();

    engine.subscribe(sub_handle, "chan").unwrap();
    engine.disconnect(subscriber).unwrap();

    let payload = slot::encode(&Value::from("x"));
    engine
        .publish(pub_handle, "chan", 0.0, 0.0, 10.0, &payload, 0)
        .unwrap();
    assert!(deliveries_for(sub_handle).is_empty());
}
