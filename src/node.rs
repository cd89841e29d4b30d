//! Node descriptors and the body/saga traits.
//!
//! A node is declared once at build time ([`NodeDecl`]) and never mutated.
//! Its behavior lives in a [`NodeBody`], plus (for long-running nodes) an
//! optional [`Saga`] that iterates on the computed value after the body runs.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use loomflow::context::NodeCtx;
//! use loomflow::node::{NodeBody, NodeDecl};
//! use loomflow::signal::Signal;
//! use serde_json::{json, Value};
//!
//! struct Greeting;
//!
//! #[async_trait]
//! impl NodeBody for Greeting {
//!     async fn compute(&self, ctx: &NodeCtx) -> Result<Value, Signal> {
//!         let who: i64 = ctx.get_as("a")?;
//!         Ok(json!(format!("hello {who}")))
//!     }
//! }
//!
//! let decl = NodeDecl::new("b").with_dependencies(["a"]);
//! assert_eq!(decl.key.as_str(), "b");
//! # let _ = Greeting;
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::context::NodeCtx;
use crate::signal::Signal;
use crate::types::NodeKey;

/// The imperative body of a node.
///
/// `compute` produces the node's value from its context. It may suspend by
/// returning a [`Signal`] (usually forwarded from a context operation with
/// `?`); the executor re-runs the body against the event log until it
/// completes, suspends on missing input, or fails.
///
/// Bodies must be deterministic given the same dependency values and event
/// prefix: replay relies on the body issuing step and capture calls in the
/// same order on every execution.
#[async_trait]
pub trait NodeBody: Send + Sync {
    /// Produce the node's value.
    async fn compute(&self, ctx: &NodeCtx) -> Result<Value, Signal>;
}

/// Whether a saga wants another iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SagaAction {
    /// Run another iteration with the new value.
    Cont,
    /// Stop; the new value is the node's result.
    Halt,
}

/// The result of one saga iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct SagaTurn {
    /// Continue or halt.
    pub action: SagaAction,
    /// The value carried into the next iteration (or returned on halt).
    pub value: Value,
}

impl SagaTurn {
    /// Continue iterating with `value`.
    #[must_use]
    pub fn cont(value: Value) -> Self {
        SagaTurn {
            action: SagaAction::Cont,
            value,
        }
    }

    /// Halt with `value` as the node's result.
    #[must_use]
    pub fn halt(value: Value) -> Self {
        SagaTurn {
            action: SagaAction::Halt,
            value,
        }
    }
}

/// An iterative post-compute loop attached to a node.
///
/// After `compute` produces a value, the executor calls `turn` repeatedly,
/// feeding each iteration the previous one's value, until a turn halts or
/// suspends. A suspended saga checkpoints its position and value so later
/// runs resume mid-loop instead of replaying the whole history; while it is
/// suspended, the latest value stays visible to dependent nodes.
#[async_trait]
pub trait Saga: Send + Sync {
    /// Run one iteration on the current value.
    async fn turn(&self, ctx: &NodeCtx, value: Value) -> Result<SagaTurn, Signal>;
}

/// Adapter implementing [`NodeBody`] for a plain synchronous closure.
///
/// Construct through [`body_fn`], which pins the closure signature for
/// inference.
pub struct FnBody<F>(F);

#[async_trait]
impl<F> NodeBody for FnBody<F>
where
    F: Fn(&NodeCtx) -> Result<Value, Signal> + Send + Sync,
{
    async fn compute(&self, ctx: &NodeCtx) -> Result<Value, Signal> {
        (self.0)(ctx)
    }
}

/// A [`NodeBody`] from a synchronous closure.
///
/// Most bodies only read dependencies and issue step/capture calls, all of
/// which are synchronous on the context; this keeps such nodes to one line.
pub fn body_fn<F>(f: F) -> FnBody<F>
where
    F: Fn(&NodeCtx) -> Result<Value, Signal> + Send + Sync,
{
    FnBody(f)
}

/// Adapter implementing [`Saga`] for a plain synchronous closure.
///
/// Construct through [`saga_fn`].
pub struct FnSaga<F>(F);

#[async_trait]
impl<F> Saga for FnSaga<F>
where
    F: Fn(&NodeCtx, Value) -> Result<SagaTurn, Signal> + Send + Sync,
{
    async fn turn(&self, ctx: &NodeCtx, value: Value) -> Result<SagaTurn, Signal> {
        (self.0)(ctx, value)
    }
}

/// A [`Saga`] from a synchronous closure.
pub fn saga_fn<F>(f: F) -> FnSaga<F>
where
    F: Fn(&NodeCtx, Value) -> Result<SagaTurn, Signal> + Send + Sync,
{
    FnSaga(f)
}

/// The build-time declaration of a node: identity, wiring, and metadata.
///
/// Declarations are immutable once the workflow is compiled. Dependencies are
/// ordered and must name nodes added before this one.
#[derive(Clone, Debug)]
pub struct NodeDecl {
    /// Unique key within the workflow.
    pub key: NodeKey,
    /// Keys of the nodes this one reads, in declaration order.
    pub dependencies: Vec<NodeKey>,
    /// Optional group tag; the group must be registered on the builder.
    pub group: Option<String>,
    /// Human-readable title for topology views.
    pub title: Option<String>,
    /// Longer description for topology views.
    pub description: Option<String>,
    /// Opaque schema of the node's value; never validated by the engine.
    pub schema: Value,
}

impl NodeDecl {
    /// Declare a node with the given key.
    #[must_use]
    pub fn new(key: impl Into<NodeKey>) -> Self {
        NodeDecl {
            key: key.into(),
            dependencies: Vec::new(),
            group: None,
            title: None,
            description: None,
            schema: Value::Null,
        }
    }

    /// Declare the nodes this one depends on, in order.
    #[must_use]
    pub fn with_dependencies<I, K>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<NodeKey>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Tag the node with a group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
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

    /// Attach the node's value schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

/// A compiled node: its declaration plus executable behavior.
#[derive(Clone)]
pub struct NodeSpec {
    pub(crate) decl: NodeDecl,
    pub(crate) body: Arc<dyn NodeBody>,
    pub(crate) saga: Option<Arc<dyn Saga>>,
}

impl NodeSpec {
    pub(crate) fn new(
        decl: NodeDecl,
        body: Arc<dyn NodeBody>,
        saga: Option<Arc<dyn Saga>>,
    ) -> Self {
        NodeSpec { decl, body, saga }
    }

    /// The node's key.
    #[must_use]
    pub fn key(&self) -> &NodeKey {
        &self.decl.key
    }

    /// The node's declared dependencies, in order.
    #[must_use]
    pub fn dependencies(&self) -> &[NodeKey] {
        &self.decl.dependencies
    }

    /// The node's declaration.
    #[must_use]
    pub fn decl(&self) -> &NodeDecl {
        &self.decl
    }

    /// True when the node carries a saga.
    #[must_use]
    pub fn is_saga(&self) -> bool {
        self.saga.is_some()
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("decl", &self.decl)
            .field("saga", &self.saga.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decl_builder_accumulates_metadata() {
        let decl = NodeDecl::new("d")
            .with_dependencies(["b", "c"])
            .with_group("billing")
            .with_title("Summarize")
            .with_schema(serde_json::json!({"type": "object"}));
        assert_eq!(decl.key.as_str(), "d");
        assert_eq!(decl.dependencies.len(), 2);
        assert_eq!(decl.group.as_deref(), Some("billing"));
        assert_eq!(decl.title.as_deref(), Some("Summarize"));
    }

    #[test]
    fn saga_turn_constructors() {
        let turn = SagaTurn::cont(serde_json::json!(11));
        assert_eq!(turn.action, SagaAction::Cont);
        let turn = SagaTurn::halt(serde_json::json!(16));
        assert_eq!(turn.action, SagaAction::Halt);
    }
}
