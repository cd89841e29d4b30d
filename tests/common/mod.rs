use loomflow::event::StepEvent;
use loomflow::outcome::NodeOutcome;
use loomflow::types::NodeKey;
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Shorthand for a bare incoming event with a zero timestamp.
#[allow(dead_code)]
pub fn ev(path: Vec<&str>, value: Value) -> StepEvent {
    StepEvent::new(path.into(), value, 0)
}

/// The outcome recorded for `key`, panicking with a readable message when the
/// schedule never produced one.
#[allow(dead_code)]
pub fn outcome<'a>(
    values: &'a FxHashMap<NodeKey, NodeOutcome>,
    key: &str,
) -> &'a NodeOutcome {
    values
        .get(key)
        .unwrap_or_else(|| panic!("no outcome recorded for node {key}"))
}

/// The `done` value of `key`, panicking on any other status.
#[allow(dead_code)]
pub fn done_value<'a>(values: &'a FxHashMap<NodeKey, NodeOutcome>, key: &str) -> &'a Value {
    match outcome(values, key) {
        NodeOutcome::Done { value } => value,
        other => panic!("expected {key} to be done, got {other:?}"),
    }
}

/// The error message of a failed node, panicking on any other status.
#[allow(dead_code)]
pub fn failure_message<'a>(
    values: &'a FxHashMap<NodeKey, NodeOutcome>,
    key: &str,
) -> &'a str {
    match outcome(values, key) {
        NodeOutcome::Failed { error } => &error.message,
        other => panic!("expected {key} to have failed, got {other:?}"),
    }
}

/// Assert that `longer`'s log for `node` extends `shorter`'s as a prefix.
#[allow(dead_code)]
pub fn assert_prefix_extension(
    shorter: &loomflow::event::EventLog,
    longer: &loomflow::event::EventLog,
    node: &str,
) {
    let before = shorter.for_node(node);
    let after = longer.for_node(node);
    assert!(
        after.len() >= before.len(),
        "log for {node} shrank: {} -> {}",
        before.len(),
        after.len()
    );
    assert_eq!(
        &after[..before.len()],
        before,
        "log for {node} is not a prefix extension"
    );
}
