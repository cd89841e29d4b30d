//! Topological execution pass over the workflow DAG.
//!
//! Nodes run strictly one at a time, dependencies first. A node's failure or
//! suspension never aborts the pass; downstream nodes observe it through the
//! dependency-satisfaction rule and usually settle as pending.

use rustc_hash::FxHashMap;

use crate::event::{EventLog, StepEvent};
use crate::node::NodeSpec;
use crate::runtime::executor::execute_node;
use crate::runtime::session::RunSession;
use crate::snapshot::SnapshotStore;
use crate::types::NodeKey;

/// Run every node of `order` once, accumulating outcomes into the session.
///
/// Incoming events are sliced per node by their owner segment; events
/// addressed to keys outside `nodes` are ignored.
pub(crate) async fn run_schedule(
    nodes: &FxHashMap<NodeKey, NodeSpec>,
    order: &[NodeKey],
    events: &EventLog,
    snapshots: &SnapshotStore,
    incoming: &[StepEvent],
    session: &mut RunSession,
) {
    for key in order {
        let Some(spec) = nodes.get(key) else {
            continue;
        };
        let slice: Vec<StepEvent> = incoming
            .iter()
            .filter(|event| event.node() == key.as_str())
            .cloned()
            .collect();

        session.stack.push(key.clone());
        let output = execute_node(
            spec,
            events.for_node(key.as_str()),
            &slice,
            snapshots.get(key.as_str()),
            session,
        )
        .await;
        session.stack.pop();

        tracing::debug!(
            node = %key,
            consumed = output.consumed.len(),
            outcome = discriminant_name(&output.outcome),
            "node executed"
        );

        session.consumed.extend(output.consumed);
        session.warnings.extend(output.warnings);
        session.results.insert(key.clone(), output.outcome);
    }
}

fn discriminant_name(outcome: &crate::outcome::NodeOutcome) -> &'static str {
    use crate::outcome::NodeOutcome::*;
    match outcome {
        Pending { .. } => "pending",
        Done { .. } => "done",
        Failed { .. } => "err",
        Interrupted { .. } => "intr",
    }
}
