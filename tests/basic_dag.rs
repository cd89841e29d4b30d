mod common;
use common::*;

use loomflow::builder::WorkflowBuilder;
use loomflow::node::{body_fn, NodeDecl};
use loomflow::outcome::NodeOutcome;
use loomflow::runtime::RunOptions;
use loomflow::workflow::Workflow;
use serde_json::json;

/// The diamond: a feeds b and c, d reads both.
fn diamond() -> Workflow {
    WorkflowBuilder::new()
        .add_node(NodeDecl::new("a"), body_fn(|_ctx| Ok(json!(1))))
        .add_node(
            NodeDecl::new("b").with_dependencies(["a"]),
            body_fn(|ctx| {
                let a: i64 = ctx.get_as("a")?;
                Ok(json!(format!("hello {a}")))
            }),
        )
        .add_node(
            NodeDecl::new("c").with_dependencies(["a"]),
            body_fn(|ctx| {
                let a: i64 = ctx.get_as("a")?;
                Ok(json!(a > 0))
            }),
        )
        .add_node(
            NodeDecl::new("d").with_dependencies(["b", "c"]),
            body_fn(|ctx| {
                let b: String = ctx.get_as("b")?;
                let c: bool = ctx.get_as("c")?;
                Ok(json!({"value": b.len(), "flag": c}))
            }),
        )
        .compile()
        .unwrap()
}

#[tokio::test]
async fn diamond_completes_bottom_up() {
    let workflow = diamond();
    let values = workflow.run(&[], RunOptions::new()).await.unwrap();

    assert_eq!(done_value(&values, "a"), &json!(1));
    assert_eq!(done_value(&values, "b"), &json!("hello 1"));
    assert_eq!(done_value(&values, "c"), &json!(true));
    assert_eq!(done_value(&values, "d"), &json!({"value": 7, "flag": true}));
    assert_eq!(values.len(), 4);
}

#[tokio::test]
async fn pure_nodes_record_no_events() {
    let workflow = diamond();
    let report = workflow.dry_run(&[], RunOptions::new()).await.unwrap();
    assert!(report.new_events.is_empty());
    assert!(report.warnings.is_empty());
    assert!(!report.timed_out);
}

#[tokio::test]
async fn failed_node_leaves_downstream_pending() {
    let workflow = WorkflowBuilder::new()
        .add_node(
            NodeDecl::new("broken"),
            body_fn(|_ctx| Err(loomflow::signal::NodeError::msg("no dice").into())),
        )
        .add_node(
            NodeDecl::new("after").with_dependencies(["broken"]),
            body_fn(|ctx| {
                let v: i64 = ctx.get_as("broken")?;
                Ok(json!(v))
            }),
        )
        .compile()
        .unwrap();

    let values = workflow.run(&[], RunOptions::new()).await.unwrap();
    assert_eq!(failure_message(&values, "broken"), "no dice");
    match outcome(&values, "after") {
        NodeOutcome::Pending { nodes } => {
            assert_eq!(nodes.len(), 1);
            assert_eq!(nodes[0].as_str(), "broken");
        }
        other => panic!("expected after to be pending, got {other:?}"),
    }
}

#[tokio::test]
async fn topology_view_reflects_declarations() {
    let workflow = WorkflowBuilder::new()
        .add_group("math")
        .add_node(NodeDecl::new("a").with_title("Seed"), body_fn(|_ctx| Ok(json!(1))))
        .add_node(
            NodeDecl::new("b")
                .with_dependencies(["a"])
                .with_group("math")
                .with_schema(json!({"type": "number"})),
            body_fn(|ctx| {
                let a: i64 = ctx.get_as("a")?;
                Ok(json!(a + 1))
            }),
        )
        .compile()
        .unwrap();

    let topology = workflow.topology();
    assert_eq!(topology.len(), 2);
    assert_eq!(topology[0].node.as_str(), "a");
    assert_eq!(topology[0].title.as_deref(), Some("Seed"));
    assert_eq!(topology[1].group.as_deref(), Some("math"));
    assert_eq!(topology[1].schema, json!({"type": "number"}));
    assert!(!topology[1].is_saga);
    assert_eq!(workflow.groups(), &["math".to_string()]);

    let wire = serde_json::to_value(&topology[1]).unwrap();
    assert_eq!(wire["isSaga"], json!(false));
    assert_eq!(wire["dependencies"], json!(["a"]));
}

#[tokio::test]
async fn execution_order_is_dependency_first() {
    let order = diamond().topological_sort();
    let pos = |k: &str| order.iter().position(|n| n.as_str() == k).unwrap();
    assert!(pos("a") < pos("b"));
    assert!(pos("a") < pos("c"));
    assert!(pos("b") < pos("d"));
    assert!(pos("c") < pos("d"));
}
