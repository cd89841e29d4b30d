//! The effect surface a node body executes against.
//!
//! [`NodeCtx`] is built by the executor for one execution attempt of one
//! node. It exposes the dependency values the scheduler resolved and the
//! suspending effect operations (`step`, `capture`, `now`, `random`,
//! `sleep`, `wait_until`), all of which route through the attempt's replay
//! resolver. Effect operations are synchronous: suspension is expressed by
//! returning a [`Signal`], which bodies forward with `?`.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use loomflow::context::NodeCtx;
//! use loomflow::event::StepContext;
//! use loomflow::node::NodeBody;
//! use loomflow::signal::Signal;
//! use serde_json::{json, Value};
//!
//! struct Approval;
//!
//! #[async_trait]
//! impl NodeBody for Approval {
//!     async fn compute(&self, ctx: &NodeCtx) -> Result<Value, Signal> {
//!         // Suspends until an event for ["<node>", "approved"] arrives.
//!         let answer = ctx.step(
//!             StepContext::new("approved").with_schema(json!({"type": "boolean"})),
//!         )?;
//!         Ok(json!({ "approved": answer }))
//!     }
//! }
//! # let _ = Approval;
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::event::StepContext;
use crate::runtime::resolver::StepResolver;
use crate::runtime::session::NowFn;
use crate::signal::{Captured, EffectSignal, InputSignal, NodeError, Signal};
use crate::types::{NodeKey, StepPath};

/// Schema attached to the reserved clock capture.
fn clock_schema() -> Value {
    json!({"type": "integer", "title": "epoch-ms"})
}

/// Schema attached to the reserved entropy capture.
fn entropy_schema() -> Value {
    json!({"type": "number", "minimum": 0, "exclusiveMaximum": 1})
}

/// Schema attached to time-based suspensions.
fn deadline_schema() -> Value {
    json!({"type": "integer", "title": "waitUntil"})
}

/// Execution context handed to a node body for one attempt.
pub struct NodeCtx {
    /// Node-key path prefixes; the owning node is the last entry.
    stack: Vec<NodeKey>,
    /// Values of the node's satisfied dependencies.
    deps: FxHashMap<NodeKey, Value>,
    /// Replay state for this attempt. Locked only inside synchronous effect
    /// calls, never across an await point.
    resolver: Mutex<StepResolver>,
    now_override: Option<NowFn>,
}

impl NodeCtx {
    pub(crate) fn new(
        stack: Vec<NodeKey>,
        deps: FxHashMap<NodeKey, Value>,
        resolver: StepResolver,
        now_override: Option<NowFn>,
    ) -> Self {
        NodeCtx {
            stack,
            deps,
            resolver: Mutex::new(resolver),
            now_override,
        }
    }

    /// The value of a dependency, when it produced one.
    ///
    /// Completed dependencies and suspended sagas that have published a
    /// partial value both answer; anything else is `None`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.deps.get(key).cloned()
    }

    /// Typed view of a dependency value.
    ///
    /// Fails when the dependency produced no value or the value does not
    /// deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, NodeError> {
        let value = self
            .deps
            .get(key)
            .ok_or_else(|| NodeError::msg(format!("dependency {key} has no value")))?;
        serde_json::from_value(value.clone())
            .map_err(|err| NodeError::msg(format!("dependency {key}: {err}")))
    }

    /// The pure suspension primitive.
    ///
    /// Replays the next recorded event when one exists for this step;
    /// otherwise suspends the node, surfacing the step's context (schema
    /// included) so an external system can supply the answering event.
    pub fn step(&self, context: StepContext) -> Result<Value, Signal> {
        self.resolver.lock().resolve(&self.stack, &context)
    }

    /// An idempotent side effect.
    ///
    /// On first execution the thunk runs: a [`Captured::Ready`] value is
    /// recorded as an event immediately, a [`Captured::Deferred`] future is
    /// handed to the executor, which awaits it, records the result, and
    /// re-executes the body. On every later execution the recorded event is
    /// replayed and the thunk never runs again.
    pub fn capture<F>(&self, context: StepContext, effect: F) -> Result<Value, Signal>
    where
        F: FnOnce() -> Captured,
    {
        let mut context = context;
        context.key = format!("capture:{}", context.key);
        match self.step(context.clone()) {
            Ok(value) => Ok(value),
            Err(Signal::Input(_)) => {
                let path = StepPath::from_stack(&self.stack, &context.key);
                match effect() {
                    Captured::Ready(value) => {
                        self.resolver.lock().synthesize(
                            path,
                            &context,
                            value.clone(),
                            self.get_now(),
                        );
                        Ok(value)
                    }
                    Captured::Deferred(future) => Err(Signal::Effect(EffectSignal {
                        path,
                        context,
                        future,
                    })),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// A deterministically replayable timestamp (epoch-ms).
    ///
    /// The wall clock is read once, recorded under the reserved step key
    /// `now`, and replayed on every later execution.
    pub fn now(&self) -> Result<i64, Signal> {
        let recorded = self.capture(StepContext::new("now").with_schema(clock_schema()), || {
            Captured::Ready(json!(self.get_now()))
        })?;
        recorded
            .as_i64()
            .ok_or_else(|| NodeError::msg("recorded clock value is not an integer").into())
    }

    /// Deterministically replayable entropy in `[0, 1)`.
    pub fn random(&self) -> Result<f64, Signal> {
        let recorded = self.capture(
            StepContext::new("random").with_schema(entropy_schema()),
            || Captured::Ready(json!(rand::random::<f64>())),
        )?;
        recorded
            .as_f64()
            .ok_or_else(|| NodeError::msg("recorded entropy value is not a number").into())
    }

    /// Suspend for `ms` milliseconds from the (replayed) current time.
    ///
    /// The base timestamp is captured via [`now`](Self::now), so the deadline
    /// is stable across resumptions.
    pub fn sleep(&self, ms: i64, context: Option<StepContext>) -> Result<(), Signal> {
        let deadline = self.now()? + ms;
        let context = context.unwrap_or_else(|| StepContext::new("sleep"));
        self.wait_until(deadline, Some(context))
    }

    /// Proceed once the clock reaches `deadline` (epoch-ms); suspend until
    /// then.
    ///
    /// Time-based suspensions carry the deadline in the node's outcome so the
    /// embedder knows when a re-run will make progress. No event is recorded:
    /// once the deadline has passed, the call is a no-op on every execution.
    pub fn wait_until(&self, deadline: i64, context: Option<StepContext>) -> Result<(), Signal> {
        if self.get_now() >= deadline {
            return Ok(());
        }
        let mut context = context.unwrap_or_else(|| StepContext::new("waitUntil"));
        if context.schema.is_null() {
            context.schema = deadline_schema();
        }
        let path = StepPath::from_stack(&self.stack, &context.key);
        Err(Signal::Input(InputSignal {
            path,
            context,
            wait_until: Some(deadline),
        }))
    }

    /// The run's clock: the `now` override when present, wall time otherwise.
    pub(crate) fn get_now(&self) -> i64 {
        match &self.now_override {
            Some(now) => now(),
            None => Utc::now().timestamp_millis(),
        }
    }

    pub(crate) fn cursor(&self) -> usize {
        self.resolver.lock().cursor()
    }

    pub(crate) fn into_resolver(self) -> StepResolver {
        self.resolver.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StepEvent;
    use std::sync::Arc;

    fn ctx_with(incoming: &[StepEvent], now: Option<i64>) -> NodeCtx {
        let resolver = StepResolver::new(&[], incoming, &[]);
        NodeCtx::new(
            vec![NodeKey::from("n")],
            FxHashMap::default(),
            resolver,
            now.map(|ms| Arc::new(move || ms) as NowFn),
        )
    }

    #[test]
    fn capture_replays_without_running_the_thunk() {
        let incoming = [StepEvent::new(vec!["n", "capture:noop"].into(), json!(1), 5)];
        let ctx = ctx_with(&incoming, None);
        let mut ran = false;
        let value = ctx
            .capture(StepContext::new("noop"), || {
                ran = true;
                Captured::Ready(json!(2))
            })
            .unwrap();
        assert_eq!(value, json!(1));
        assert!(!ran);
    }

    #[test]
    fn ready_capture_records_and_returns() {
        let ctx = ctx_with(&[], Some(99));
        let value = ctx
            .capture(StepContext::new("noop"), || Captured::Ready(json!(7)))
            .unwrap();
        assert_eq!(value, json!(7));
        let (consumed, fresh, _) = ctx.into_resolver().into_parts();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].path, vec!["n", "capture:noop"].into());
        assert_eq!(fresh[0].recorded_at, 99);
        assert_eq!(consumed.len(), 1);
    }

    #[test]
    fn now_is_replayed_from_the_log() {
        let incoming = [StepEvent::new(
            vec!["n", "capture:now"].into(),
            json!(1_000),
            5,
        )];
        let ctx = ctx_with(&incoming, Some(2_000));
        assert_eq!(ctx.now().unwrap(), 1_000);
    }

    #[test]
    fn wait_until_passes_once_deadline_reached() {
        let ctx = ctx_with(&[], Some(50));
        assert!(ctx.wait_until(50, None).is_ok());
        assert!(ctx.wait_until(49, None).is_ok());
    }

    #[test]
    fn wait_until_suspends_with_deadline() {
        let ctx = ctx_with(&[], Some(50));
        let err = ctx.wait_until(60, None).unwrap_err();
        match err {
            Signal::Input(input) => {
                assert_eq!(input.path, vec!["n", "waitUntil"].into());
                assert_eq!(input.wait_until, Some(60));
                assert!(!input.context.schema.is_null());
            }
            other => panic!("expected input signal, got {other:?}"),
        }
    }

    #[test]
    fn sleep_builds_deadline_from_captured_now() {
        let ctx = ctx_with(&[], Some(100));
        let err = ctx.sleep(25, None).unwrap_err();
        match err {
            Signal::Input(input) => {
                assert_eq!(input.wait_until, Some(125));
                assert_eq!(input.path, vec!["n", "sleep"].into());
            }
            other => panic!("expected input signal, got {other:?}"),
        }
        // The captured base timestamp is recorded even though the node parks.
        let (consumed, _, _) = ctx.into_resolver().into_parts();
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].path, vec!["n", "capture:now"].into());
    }

    #[test]
    fn typed_dependency_access() {
        let mut deps = FxHashMap::default();
        deps.insert(NodeKey::from("a"), json!(41));
        let ctx = NodeCtx::new(
            vec![NodeKey::from("n")],
            deps,
            StepResolver::new(&[], &[], &[]),
            None,
        );
        let value: i64 = ctx.get_as("a").unwrap();
        assert_eq!(value, 41);
        assert!(ctx.get_as::<String>("a").is_err());
        assert!(ctx.get_as::<i64>("missing").is_err());
        assert_eq!(ctx.get("missing"), None);
    }
}
