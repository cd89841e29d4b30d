//! Declarative construction of workflows.
//!
//! [`WorkflowBuilder`] accumulates groups and node declarations, then
//! [`compile`](WorkflowBuilder::compile) validates the accumulated graph and
//! produces a runnable [`Workflow`]. Validation enforces the ordering rule
//! the replay engine relies on: every dependency must have been added before
//! the node that reads it, which makes the graph acyclic by construction.
//!
//! # Examples
//!
//! ```rust
//! use loomflow::builder::WorkflowBuilder;
//! use loomflow::node::{body_fn, NodeDecl};
//! use serde_json::json;
//!
//! let workflow = WorkflowBuilder::new()
//!     .add_node(NodeDecl::new("a"), body_fn(|_ctx| Ok(json!(1))))
//!     .add_node(
//!         NodeDecl::new("b").with_dependencies(["a"]),
//!         body_fn(|ctx| {
//!             let a: i64 = ctx.get_as("a")?;
//!             Ok(json!(format!("hello {a}")))
//!         }),
//!     )
//!     .compile()
//!     .unwrap();
//!
//! assert_eq!(workflow.node_count(), 2);
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::node::{NodeBody, NodeDecl, NodeSpec, Saga};
use crate::types::NodeKey;
use crate::workflow::{DurableState, NodeTable, Workflow};

/// Errors detected while compiling a workflow declaration.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("duplicate node key: {key}")]
    #[diagnostic(
        code(loomflow::builder::duplicate_node),
        help("Node keys must be unique within a workflow.")
    )]
    DuplicateNode { key: NodeKey },

    #[error("node {key} depends on unknown node {dependency}")]
    #[diagnostic(
        code(loomflow::builder::unknown_dependency),
        help("Add dependencies before the nodes that read them; forward references are not allowed.")
    )]
    UnknownDependency { key: NodeKey, dependency: NodeKey },

    #[error("node {key} references unregistered group {group}")]
    #[diagnostic(
        code(loomflow::builder::unknown_group),
        help("Register the group with add_group before tagging nodes with it.")
    )]
    UnknownGroup { key: NodeKey, group: String },
}

struct PendingNode {
    decl: NodeDecl,
    body: Arc<dyn NodeBody>,
    saga: Option<Arc<dyn Saga>>,
}

/// Accumulates groups and nodes, then compiles them into a [`Workflow`].
#[derive(Default)]
pub struct WorkflowBuilder {
    groups: Vec<String>,
    entries: Vec<PendingNode>,
}

impl WorkflowBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        WorkflowBuilder::default()
    }

    /// Register a group name. Registration is idempotent and carries no
    /// behavior beyond making the name available to node declarations.
    #[must_use]
    pub fn add_group(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.groups.contains(&name) {
            self.groups.push(name);
        }
        self
    }

    /// Add a node with the given declaration and body.
    ///
    /// Validation happens at [`compile`](Self::compile) time, before any
    /// workflow exists.
    #[must_use]
    pub fn add_node(mut self, decl: NodeDecl, body: impl NodeBody + 'static) -> Self {
        self.entries.push(PendingNode {
            decl,
            body: Arc::new(body),
            saga: None,
        });
        self
    }

    /// Add a node whose value is iterated by a saga after the body runs.
    #[must_use]
    pub fn add_saga_node(
        mut self,
        decl: NodeDecl,
        body: impl NodeBody + 'static,
        saga: impl Saga + 'static,
    ) -> Self {
        self.entries.push(PendingNode {
            decl,
            body: Arc::new(body),
            saga: Some(Arc::new(saga)),
        });
        self
    }

    /// Validate the accumulated declaration and produce a workflow with an
    /// empty event log.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicateNode`] on a repeated key,
    /// [`BuildError::UnknownDependency`] when a dependency was not added
    /// before its dependent, and [`BuildError::UnknownGroup`] when a node
    /// names an unregistered group.
    pub fn compile(self) -> Result<Workflow, BuildError> {
        let mut nodes: FxHashMap<NodeKey, NodeSpec> = FxHashMap::default();
        let mut order = Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            let key = entry.decl.key.clone();
            if nodes.contains_key(&key) {
                return Err(BuildError::DuplicateNode { key });
            }
            for dependency in &entry.decl.dependencies {
                if !nodes.contains_key(dependency) {
                    return Err(BuildError::UnknownDependency {
                        key: key.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            if let Some(group) = &entry.decl.group {
                if !self.groups.contains(group) {
                    return Err(BuildError::UnknownGroup {
                        key: key.clone(),
                        group: group.clone(),
                    });
                }
            }
            order.push(key.clone());
            nodes.insert(key, NodeSpec::new(entry.decl, entry.body, entry.saga));
        }

        Ok(Workflow::from_table(
            Arc::new(NodeTable {
                nodes,
                order,
                groups: self.groups,
            }),
            DurableState::default(),
        ))
    }
}
