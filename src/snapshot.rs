//! Per-node saga checkpoints.
//!
//! When a saga suspends, the engine records how far into the event stream the
//! interrupted iteration had read and the value the saga was carrying. On the
//! next run the executor restores the cursor and value from the checkpoint
//! instead of re-running the node's compute step.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::NodeKey;

/// A saga checkpoint: the event-stream position consumed before the
/// interrupted iteration was entered, and the value it was carrying.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SagaSnapshot {
    /// Number of events consumed before the saga iteration began.
    pub event_index: usize,
    /// The pre-iteration (or last-iteration) saga value.
    pub value: Value,
}

/// Checkpoint storage, one [`SagaSnapshot`] per saga node.
///
/// Snapshots are written only when a saga is interrupted and overwritten on
/// each later interruption; resumption reads and keeps them (a stale snapshot
/// is harmless because the cursor it stores only ever moves forward).
#[derive(Clone, Debug, Default)]
pub struct SnapshotStore {
    by_node: FxHashMap<NodeKey, SagaSnapshot>,
}

impl SnapshotStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        SnapshotStore::default()
    }

    /// The checkpoint for a node, if one has been recorded.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SagaSnapshot> {
        self.by_node.get(key)
    }

    /// Record (or overwrite) the checkpoint for a node.
    pub fn put(&mut self, key: NodeKey, snapshot: SagaSnapshot) {
        self.by_node.insert(key, snapshot);
    }

    /// True when no checkpoints have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}
