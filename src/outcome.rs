//! Per-node run outcomes.
//!
//! Every node a run touches ends up with exactly one [`NodeOutcome`]. The
//! serialized form is a tagged union discriminated by `status`, matching the
//! event wire's compact style.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::FullStepContext;
use crate::signal::NodeError;
use crate::types::NodeKey;

/// What happened to one node during a run.
///
/// `Interrupted` is not an error: it means the node parked on a step that has
/// no recorded event yet, and reports which step (with its schema) so an
/// external system can produce the answering event. A suspended saga also
/// carries the value it had reached, which dependents are allowed to read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// One or more dependencies did not produce a usable value.
    #[serde(rename = "pending")]
    Pending {
        /// The unsatisfied dependencies, in declaration order.
        nodes: Vec<NodeKey>,
    },
    /// The node completed with this value.
    #[serde(rename = "done")]
    Done {
        /// The computed value.
        value: Value,
    },
    /// The node body failed; the error is local to this node.
    #[serde(rename = "err")]
    Failed {
        /// What went wrong.
        error: NodeError,
    },
    /// The node suspended waiting for an event (or a deadline).
    #[serde(rename = "intr")]
    Interrupted {
        /// The waiting step, addressed by its full path.
        step: FullStepContext,
        /// The value a suspended saga had reached, visible to dependents.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        /// Event-stream position of the interrupted saga iteration.
        #[serde(
            rename = "eventIdx",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        event_idx: Option<usize>,
        /// Epoch-ms deadline for time-based suspensions.
        #[serde(
            rename = "waitUntil",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        wait_until: Option<i64>,
    },
}

impl NodeOutcome {
    /// True for [`NodeOutcome::Done`].
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, NodeOutcome::Done { .. })
    }

    /// True for [`NodeOutcome::Pending`].
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, NodeOutcome::Pending { .. })
    }

    /// True for [`NodeOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, NodeOutcome::Failed { .. })
    }

    /// True for [`NodeOutcome::Interrupted`].
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, NodeOutcome::Interrupted { .. })
    }

    /// The value dependents may read: a completed node's result, or the
    /// partial value a suspended saga has published. `None` for anything
    /// else, which is exactly the dependency-satisfaction rule.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            NodeOutcome::Done { value } => Some(value),
            NodeOutcome::Interrupted {
                value: Some(value), ..
            } => Some(value),
            _ => None,
        }
    }
}
