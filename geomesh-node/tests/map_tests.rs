use geomesh_node::{MockEngine, Node, NodeError, Value, MAP_OPT_EXCLUSIVE};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn connected_node_on(engine: &Arc<MockEngine>) -> Node {
    let node = Node::new(engine.clone()).unwrap();
    node.connect("ws://seed.test:8080/mesh", "").unwrap();
    node
}

fn connected_node() -> Node {
    connected_node_on(&Arc::new(MockEngine::new()))
}

// ── Set / Get ────────────────────────────────────────────────────

#[test]
fn set_then_get_returns_stored_int() {
    let node = connected_node();
    let map = node.access_map("m").unwrap();
    map.set("k", 42_i64, 0).unwrap();
    assert_eq!(map.get("k").unwrap(), Value::Int(42));
}

#[test]
fn get_missing_key_is_key_not_found() {
    let node = connected_node();
    let map = node.access_map("m").unwrap();
    assert!(matches!(map.get("absent"), Err(NodeError::KeyNotFound)));
}

#[test]
fn every_value_kind_round_trips_through_the_map() {
    let node = connected_node();
    let map = node.access_map("kinds").unwrap();
    let values = [
        Value::Null,
        Value::Bool(true),
        Value::Int(-99),
        Value::Double(2.5),
        Value::String(b"bytes\x00with\x00zeros".to_vec()),
    ];
    for (index, value) in values.iter().enumerate() {
        map.set(index as i64, value.clone(), 0).unwrap();
    }
    for (index, value) in values.iter().enumerate() {
        assert_eq!(map.get(index as i64).unwrap(), *value);
    }
}

#[test]
fn set_overwrites_by_default() {
    let node = connected_node();
    let map = node.access_map("m").unwrap();
    map.set("k", 1_i64, 0).unwrap();
    map.set("k", "replaced", 0).unwrap();
    assert_eq!(map.get("k").unwrap(), Value::from("replaced"));
}

#[test]
fn exclusive_set_on_existing_key_is_set_conflict() {
    let node = connected_node();
    let map = node.access_map("m").unwrap();
    map.set("k", 1_i64, MAP_OPT_EXCLUSIVE).unwrap();
    assert!(matches!(
        map.set("k", 2_i64, MAP_OPT_EXCLUSIVE),
        Err(NodeError::SetConflict(_))
    ));
    assert_eq!(map.get("k").unwrap(), Value::Int(1));
}

#[test]
fn keys_may_be_any_kind() {
    let node = connected_node();
    let map = node.access_map("m").unwrap();
    map.set(true, "bool-key", 0).unwrap();
    map.set(7.5_f64, "double-key", 0).unwrap();
    assert_eq!(map.get(true).unwrap(), Value::from("bool-key"));
    assert_eq!(map.get(7.5_f64).unwrap(), Value::from("double-key"));
}

// ── Replication across nodes ─────────────────────────────────────

#[test]
fn second_node_observes_stored_value() {
    let engine = Arc::new(MockEngine::new());
    let writer = connected_node_on(&engine);
    let reader = connected_node_on(&engine);

    writer.access_map("shared").unwrap().set("k", 42_i64, 0).unwrap();
    assert_eq!(
        reader.access_map("shared").unwrap().get("k").unwrap(),
        Value::Int(42)
    );
}

#[test]
fn maps_with_different_names_are_independent() {
    let node = connected_node();
    let a = node.access_map("a").unwrap();
    let b = node.access_map("b").unwrap();
    a.set("k", 1_i64, 0).unwrap();
    assert!(matches!(b.get("k"), Err(NodeError::KeyNotFound)));
}
