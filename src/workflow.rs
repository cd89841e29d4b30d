//! The workflow instance: an immutable node table plus its durable state.
//!
//! A [`Workflow`] owns the compiled DAG, the per-node event log, and the saga
//! checkpoints. The node table is shared ([`spawn`](Workflow::spawn) and
//! [`fork`](Workflow::fork) produce new instances over the same descriptors),
//! while the durable state is exclusive to each instance and mutated only by
//! a successful `run`'s commit phase.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::event::EventLog;
use crate::node::NodeSpec;
use crate::snapshot::SnapshotStore;
use crate::types::NodeKey;

/// The immutable, shareable part of a workflow: node specs, insertion order,
/// and registered groups.
pub(crate) struct NodeTable {
    pub(crate) nodes: FxHashMap<NodeKey, NodeSpec>,
    pub(crate) order: Vec<NodeKey>,
    pub(crate) groups: Vec<String>,
}

/// The committed state of one instance: event log plus saga checkpoints.
/// Commit replaces both under one lock, which is what makes a `run` atomic
/// at the workflow level.
#[derive(Clone, Debug, Default)]
pub(crate) struct DurableState {
    pub(crate) events: EventLog,
    pub(crate) snapshots: SnapshotStore,
}

/// A runnable workflow instance.
///
/// Construct one through [`WorkflowBuilder`](crate::builder::WorkflowBuilder).
/// The runtime surface (`run`, `dry_run`) lives in
/// [`crate::runtime`]; this module carries the structural surface: topology
/// views, dependency queries, and instance cloning.
pub struct Workflow {
    pub(crate) table: Arc<NodeTable>,
    pub(crate) state: RwLock<DurableState>,
    pub(crate) running: AtomicBool,
}

/// One row of the node-order topology view, shaped for UI rendering.
#[derive(Clone, Debug, Serialize)]
pub struct TopologyEntry {
    /// The node's key.
    pub node: NodeKey,
    /// The node's declared value schema.
    pub schema: Value,
    /// Declared dependencies, in order.
    pub dependencies: Vec<NodeKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// True when the node carries a saga loop.
    #[serde(rename = "isSaga")]
    pub is_saga: bool,
}

impl Workflow {
    pub(crate) fn from_table(table: Arc<NodeTable>, state: DurableState) -> Self {
        Workflow {
            table,
            state: RwLock::new(state),
            running: AtomicBool::new(false),
        }
    }

    /// A fresh instance over the same node set with empty event log and
    /// checkpoints.
    #[must_use]
    pub fn spawn(&self) -> Workflow {
        Workflow::from_table(Arc::clone(&self.table), DurableState::default())
    }

    /// A new instance over the same node set carrying a copy of this
    /// instance's event log and checkpoints.
    ///
    /// The copy is deep: mutating the child's recorded values can never leak
    /// into the parent.
    #[must_use]
    pub fn fork(&self) -> Workflow {
        let state = self.state.read().clone();
        Workflow::from_table(Arc::clone(&self.table), state)
    }

    /// Registered group names, in registration order.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.table.groups
    }

    /// Number of nodes in the workflow.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.table.order.len()
    }

    /// The declared dependencies of a node, when it exists.
    #[must_use]
    pub fn get_dependencies(&self, key: &str) -> Option<&[NodeKey]> {
        self.table
            .nodes
            .get(key)
            .map(|spec| spec.dependencies())
    }

    /// Node-order view of the graph suitable for rendering.
    #[must_use]
    pub fn topology(&self) -> Vec<TopologyEntry> {
        self.table
            .order
            .iter()
            .filter_map(|key| self.table.nodes.get(key))
            .map(|spec| {
                let decl = spec.decl();
                TopologyEntry {
                    node: decl.key.clone(),
                    schema: decl.schema.clone(),
                    dependencies: decl.dependencies.clone(),
                    title: decl.title.clone(),
                    description: decl.description.clone(),
                    group: decl.group.clone(),
                    is_saga: spec.is_saga(),
                }
            })
            .collect()
    }

    /// Execution order: post-order depth-first over dependencies, ties broken
    /// by node insertion order.
    ///
    /// The build-time rule that dependencies precede their dependents makes
    /// the graph acyclic by construction, so the traversal always terminates.
    #[must_use]
    pub fn topological_sort(&self) -> Vec<NodeKey> {
        fn visit(
            key: &NodeKey,
            nodes: &FxHashMap<NodeKey, NodeSpec>,
            seen: &mut FxHashSet<NodeKey>,
            out: &mut Vec<NodeKey>,
        ) {
            if !seen.insert(key.clone()) {
                return;
            }
            if let Some(spec) = nodes.get(key) {
                for dep in spec.dependencies() {
                    visit(dep, nodes, seen, out);
                }
            }
            out.push(key.clone());
        }

        let mut seen = FxHashSet::default();
        let mut out = Vec::with_capacity(self.table.order.len());
        for key in &self.table.order {
            visit(key, &self.table.nodes, &mut seen, &mut out);
        }
        out
    }

    /// Snapshot of the committed event log, for external persistence.
    #[must_use]
    pub fn events(&self) -> EventLog {
        self.state.read().events.clone()
    }

    /// Snapshot of the committed saga checkpoints.
    #[must_use]
    pub fn snapshots(&self) -> SnapshotStore {
        self.state.read().snapshots.clone()
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("nodes", &self.table.order)
            .field("groups", &self.table.groups)
            .finish_non_exhaustive()
    }
}
