mod common;
use common::*;

use loomflow::builder::WorkflowBuilder;
use loomflow::event::StepContext;
use loomflow::node::{body_fn, saga_fn, NodeDecl, SagaTurn};
use loomflow::outcome::NodeOutcome;
use loomflow::runtime::{RunOptions, RunnerError};
use loomflow::signal::NodeError;
use loomflow::workflow::Workflow;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn as_i64(value: &Value) -> Result<i64, NodeError> {
    value
        .as_i64()
        .ok_or_else(|| NodeError::msg("saga value must be a number"))
}

#[tokio::test]
async fn saga_iterates_to_halt() {
    let workflow = WorkflowBuilder::new()
        .add_node(NodeDecl::new("n1"), body_fn(|_ctx| Ok(json!(5))))
        .add_saga_node(
            NodeDecl::new("n2").with_dependencies(["n1"]),
            body_fn(|ctx| {
                let n1: i64 = ctx.get_as("n1")?;
                Ok(json!(n1 * 2))
            }),
            saga_fn(|_ctx, value| {
                let next = as_i64(&value)? + 1;
                Ok(if next > 15 {
                    SagaTurn::halt(json!(next))
                } else {
                    SagaTurn::cont(json!(next))
                })
            }),
        )
        .compile()
        .unwrap();

    let values = workflow.run(&[], RunOptions::new()).await.unwrap();
    assert_eq!(done_value(&values, "n2"), &json!(16));
    assert!(workflow.topology()[1].is_saga);
}

/// `n1` is a saga fed by external additions; `n2` doubles whatever `n1` has
/// reached, including mid-saga partial values.
fn additive(compute_calls: Arc<AtomicUsize>) -> Workflow {
    WorkflowBuilder::new()
        .add_saga_node(
            NodeDecl::new("n1"),
            body_fn(move |_ctx| {
                compute_calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(5))
            }),
            saga_fn(|ctx, value| {
                let add = ctx.step(
                    StepContext::new("addition").with_schema(json!({"type": "number"})),
                )?;
                let next = as_i64(&value)? + as_i64(&add)?;
                Ok(SagaTurn::cont(json!(next)))
            }),
        )
        .add_node(
            NodeDecl::new("n2").with_dependencies(["n1"]),
            body_fn(|ctx| {
                let n1: i64 = ctx.get_as("n1")?;
                Ok(json!(n1 * 2))
            }),
        )
        .compile()
        .unwrap()
}

#[tokio::test]
async fn suspended_saga_publishes_partial_value_downstream() {
    let compute_calls = Arc::new(AtomicUsize::new(0));
    let workflow = additive(Arc::clone(&compute_calls));

    let values = workflow.run(&[], RunOptions::new()).await.unwrap();
    match outcome(&values, "n1") {
        NodeOutcome::Interrupted {
            value, event_idx, ..
        } => {
            assert_eq!(value.as_ref(), Some(&json!(5)));
            // The first iteration starts at position zero, which is omitted.
            assert!(event_idx.is_none());
        }
        other => panic!("expected n1 to be interrupted, got {other:?}"),
    }
    assert_eq!(done_value(&values, "n2"), &json!(10));

    let values = workflow
        .run(&[ev(vec!["n1", "addition"], json!(3))], RunOptions::new())
        .await
        .unwrap();
    match outcome(&values, "n1") {
        NodeOutcome::Interrupted {
            value, event_idx, ..
        } => {
            assert_eq!(value.as_ref(), Some(&json!(8)));
            assert_eq!(*event_idx, Some(1));
        }
        other => panic!("expected n1 to be interrupted, got {other:?}"),
    }
    assert_eq!(done_value(&values, "n2"), &json!(16));
}

#[tokio::test]
async fn checkpoint_resumes_without_recompute() {
    let compute_calls = Arc::new(AtomicUsize::new(0));
    let workflow = additive(Arc::clone(&compute_calls));

    workflow.run(&[], RunOptions::new()).await.unwrap();
    workflow
        .run(&[ev(vec!["n1", "addition"], json!(3))], RunOptions::new())
        .await
        .unwrap();
    // No checkpoint existed before the second run, so compute ran twice.
    assert_eq!(compute_calls.load(Ordering::SeqCst), 2);
    let snapshot = workflow.snapshots();
    let checkpoint = snapshot.get("n1").expect("saga checkpoint");
    assert_eq!(checkpoint.event_index, 1);
    assert_eq!(checkpoint.value, json!(8));

    // The third run restores the checkpoint: compute is skipped and the
    // checkpoint position only moves forward.
    let values = workflow
        .run(&[ev(vec!["n1", "addition"], json!(2))], RunOptions::new())
        .await
        .unwrap();
    assert_eq!(compute_calls.load(Ordering::SeqCst), 2);
    match outcome(&values, "n1") {
        NodeOutcome::Interrupted {
            value, event_idx, ..
        } => {
            assert_eq!(value.as_ref(), Some(&json!(10)));
            assert_eq!(*event_idx, Some(2));
        }
        other => panic!("expected n1 to be interrupted, got {other:?}"),
    }
    assert_eq!(done_value(&values, "n2"), &json!(20));
    assert_eq!(workflow.snapshots().get("n1").unwrap().event_index, 2);
}

#[tokio::test]
async fn endless_saga_is_abandoned_by_timeout() {
    let workflow = WorkflowBuilder::new()
        .add_saga_node(
            NodeDecl::new("spinner"),
            body_fn(|_ctx| Ok(json!(0))),
            saga_fn(|_ctx, value| {
                let next = as_i64(&value)? + 1;
                Ok(SagaTurn::cont(json!(next)))
            }),
        )
        .compile()
        .unwrap();

    let opts = || RunOptions::new().with_timeout(Duration::from_millis(50));

    let report = workflow.dry_run(&[], opts()).await.unwrap();
    assert!(report.timed_out);

    let err = workflow.run(&[], opts()).await.unwrap_err();
    assert!(matches!(err, RunnerError::Timeout));
    // Nothing committed on the timeout path.
    assert!(workflow.events().is_empty());
    assert!(workflow.snapshots().is_empty());
}
