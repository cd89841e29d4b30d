//! Step events and the per-node event log.
//!
//! An event is the persisted witness of one suspending effect call: the step
//! path it answers, the value the body will observe on replay, and the wall
//! time it was recorded. The log is the only state the engine needs to resume
//! an interrupted node: re-executing the body against the same event prefix
//! reproduces the same sequence of step calls up to the first call without a
//! matching event.
//!
//! The compact wire shape is fixed:
//!
//! ```text
//! StepEvent        := { k: string[], v: any, ts: number }
//! StepEventWithC   := StepEvent + { c: StepContext, i?: string[][] }
//! ```
//!
//! `k[0]` is the owning node; `k[1..]` is the in-body step path. `ts` is
//! epoch-ms. `v` is opaque to the engine; validation against the declared
//! schema is the node body's responsibility.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{NodeKey, StepPath};

/// Metadata a node body declares on a step effect.
///
/// The `key` names the step *inside* the node; the engine prefixes it with
/// the node-key stack to form the full [`StepPath`]. Everything else is
/// optional descriptive metadata that rides along to external consumers
/// (persisted audit trails, UIs asking a human for input).
///
/// # Examples
///
/// ```rust
/// use loomflow::event::StepContext;
/// use serde_json::json;
///
/// let ctx = StepContext::new("need_number")
///     .with_title("Amount")
///     .with_schema(json!({"type": "object", "properties": {"x": {"type": "number"}}}));
/// assert_eq!(ctx.key, "need_number");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    /// Step identifier inside the owning node.
    pub key: String,
    /// Human-readable title for external surfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer description for external surfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional epoch-ms deadline hint for whoever answers the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    /// Opaque extra metadata.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
    /// Full paths of the inputs this step derives from, for drift detection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<StepPath>,
    /// Opaque schema for the value this step expects; never validated here.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub schema: Value,
}

impl StepContext {
    /// A context with just a step key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        StepContext {
            key: key.into(),
            ..StepContext::default()
        }
    }

    /// Attach a schema for the expected value.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Attach a title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an epoch-ms deadline hint.
    #[must_use]
    pub fn with_deadline(mut self, deadline: i64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Declare the input paths this step derives from.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<StepPath>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Attach opaque extra metadata.
    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

/// A [`StepContext`] surfaced externally, with the in-body key replaced by
/// the full step path.
///
/// This is what an interrupted node reports: enough for an external system to
/// know *which* step of *which* node is waiting, and what shape of value will
/// satisfy it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FullStepContext {
    /// Full path of the waiting step, owner first.
    pub path: StepPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub extra: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<StepPath>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub schema: Value,
}

impl FullStepContext {
    /// Combine a full path with the metadata of the declaring context.
    #[must_use]
    pub fn from_context(path: StepPath, context: StepContext) -> Self {
        FullStepContext {
            path,
            title: context.title,
            description: context.description,
            deadline: context.deadline,
            extra: context.extra,
            inputs: context.inputs,
            schema: context.schema,
        }
    }
}

/// One persisted entry of the event log.
///
/// `context` and `inputs` are the optional enrichment of the wire shape: they
/// are filled on events the engine hands back from a run (the live metadata of
/// the step that consumed or produced the event) and may be present on
/// externally supplied events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Full step path, owner first (`k`).
    #[serde(rename = "k")]
    pub path: StepPath,
    /// The value the body observes on replay (`v`); opaque to the engine.
    #[serde(rename = "v")]
    pub value: Value,
    /// Epoch-ms wall time the event was recorded (`ts`).
    #[serde(rename = "ts")]
    pub recorded_at: i64,
    /// Live metadata of the originating step (`c`), when known.
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<StepContext>,
    /// Input paths the originating step declared (`i`), when known.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<StepPath>>,
}

impl StepEvent {
    /// A bare event with no enrichment.
    #[must_use]
    pub fn new(path: StepPath, value: Value, recorded_at: i64) -> Self {
        StepEvent {
            path,
            value,
            recorded_at,
            context: None,
            inputs: None,
        }
    }

    /// The node this event belongs to (`k[0]`).
    #[must_use]
    pub fn node(&self) -> &str {
        self.path.node()
    }
}

/// Non-fatal observations surfaced by a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// A replayed event was recorded under different declared inputs than the
    /// step that consumed it now declares. The body has drifted since the
    /// event was written; the stored value was still returned.
    ContextUpdated {
        path: StepPath,
        stored: Vec<StepPath>,
        live: Vec<StepPath>,
    },
}

/// Per-node, append-only sequences of [`StepEvent`]s.
///
/// Reads are by node key; writes always append at the tail of the owning
/// node's list. Replay addresses entries positionally, so each list behaves
/// as an indexed sequence. The engine serialises runs, so the log needs no
/// internal locking.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    by_node: FxHashMap<NodeKey, Vec<StepEvent>>,
}

impl EventLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        EventLog::default()
    }

    /// The recorded events for one node, oldest first.
    #[must_use]
    pub fn for_node(&self, key: &str) -> &[StepEvent] {
        self.by_node.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append an event at the tail of its owner's list.
    ///
    /// The owner is taken from the event path's first segment.
    pub fn append(&mut self, event: StepEvent) {
        let owner = NodeKey::from(event.node());
        self.by_node.entry(owner).or_default().push(event);
    }

    /// Total number of recorded events across all nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_node.values().map(Vec::len).sum()
    }

    /// True when no events have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_node.values().all(Vec::is_empty)
    }

    /// Keys of nodes that have at least one recorded event.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeKey> {
        self.by_node.keys()
    }
}
