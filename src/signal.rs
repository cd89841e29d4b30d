//! Control-flow signals raised by node bodies.
//!
//! A node body never unwinds to suspend. Every effect operation on the
//! context returns `Result<_, Signal>`; the body forwards signals with `?`
//! and the executor selects the matching branch: park the node on an input
//! signal, await and record on an effect signal, fail the node on an ordinary
//! error. Modeling suspension as a value instead of an exception keeps the
//! executor's handling explicit and lets `?` read as "suspend here".

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::event::StepContext;
use crate::types::StepPath;

/// An error produced by a node body or on its behalf.
///
/// Node errors are data, not control flow: they live inside the node's
/// outcome and never abort the surrounding run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeError {
    /// Human-readable description.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl NodeError {
    /// An error with just a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        NodeError {
            message: message.into(),
            details: Value::Null,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for NodeError {}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::msg(err.to_string())
    }
}

/// A suspension request: the step at `path` has no recorded event yet.
///
/// Carries the declaring context (schema included) so external systems know
/// what value would resume the node, and the deadline when the suspension is
/// time-based.
#[derive(Debug)]
pub struct InputSignal {
    /// Full path of the step waiting for an event.
    pub path: StepPath,
    /// The declaring context, `key` still in in-body form.
    pub context: StepContext,
    /// Epoch-ms deadline when the suspension is time-based.
    pub wait_until: Option<i64>,
}

/// A deferred side effect handed to the executor: await the future, record
/// its value as an event, then re-execute the body so replay observes it.
pub struct EffectSignal {
    /// Full path the recorded event will carry.
    pub path: StepPath,
    /// The declaring context of the capture step.
    pub context: StepContext,
    /// The side effect in flight.
    pub future: BoxFuture<'static, Result<Value, NodeError>>,
}

impl fmt::Debug for EffectSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSignal")
            .field("path", &self.path)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// What a node body hands back instead of unwinding.
#[derive(Debug)]
pub enum Signal {
    /// Suspend: a step reached the end of its recorded events.
    Input(InputSignal),
    /// Run a side effect, record it, and re-execute the body.
    Effect(EffectSignal),
    /// An ordinary failure; the node's outcome becomes an error.
    Failure(NodeError),
}

impl From<NodeError> for Signal {
    fn from(err: NodeError) -> Self {
        Signal::Failure(err)
    }
}

/// The immediate result of a capture thunk.
pub enum Captured {
    /// The side effect completed synchronously with this value.
    Ready(Value),
    /// The side effect is asynchronous; the executor awaits it.
    Deferred(BoxFuture<'static, Result<Value, NodeError>>),
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Captured::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Captured::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
