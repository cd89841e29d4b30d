//! Core identifier types for the loomflow workflow engine.
//!
//! This module defines the types used throughout the engine for addressing
//! nodes and the steps recorded inside them. These are the core domain
//! concepts that define what an event log entry *points at*.
//!
//! # Key Types
//!
//! - [`NodeKey`]: Identifies a node within a workflow graph
//! - [`StepPath`]: Addresses a recorded step: the owning node key followed by
//!   the in-body step identifier
//!
//! # Examples
//!
//! ```rust
//! use loomflow::types::{NodeKey, StepPath};
//!
//! let key = NodeKey::from("fetch_user");
//! let path = StepPath::new(vec!["fetch_user".into(), "capture:now".into()]);
//!
//! assert_eq!(path.node(), "fetch_user");
//! assert_eq!(path.to_string(), "fetch_user/capture:now");
//! assert_eq!(path.segments().len(), 2);
//! # let _ = key;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `NodeKey` is unique within one workflow. It is the first segment of every
/// [`StepPath`] recorded for the node, which is how incoming events are routed
/// to their owner during a run.
///
/// # Examples
///
/// ```rust
/// use loomflow::types::NodeKey;
///
/// let a = NodeKey::from("charge_card");
/// let b: NodeKey = "charge_card".into();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "charge_card");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// View the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        NodeKey(s.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        NodeKey(s)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Addresses a recorded step: the owning node key followed by the in-body
/// step identifier.
///
/// A path is an ordered sequence of segments. `path[0]` is always the owning
/// node's key; the remaining segments identify the step the node body issued.
/// Paths serialize as a bare JSON array of strings, which is the `k` field of
/// the event wire shape.
///
/// The engine keeps the prefix as a *stack* of node keys rather than a single
/// key so nested execution scopes can be layered on without changing the wire
/// format; in the current engine the stack always holds exactly one key.
///
/// # Examples
///
/// ```rust
/// use loomflow::types::StepPath;
///
/// let path = StepPath::new(vec!["order".into(), "need_approval".into()]);
/// assert_eq!(path.node(), "order");
/// assert_eq!(serde_json::to_string(&path).unwrap(), r#"["order","need_approval"]"#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepPath(Vec<String>);

impl StepPath {
    /// Build a path from its raw segments.
    ///
    /// The first segment is the owning node key; callers are expected to
    /// uphold that convention.
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        StepPath(segments)
    }

    /// Build a path from a stack of node-key prefixes plus an in-body step key.
    #[must_use]
    pub fn from_stack(stack: &[NodeKey], step_key: &str) -> Self {
        let mut segments: Vec<String> = stack.iter().map(|k| k.as_str().to_string()).collect();
        segments.push(step_key.to_string());
        StepPath(segments)
    }

    /// The owning node's key (the first segment).
    ///
    /// Empty paths do not occur in a well-formed log; an empty path reports
    /// an empty owner rather than panicking.
    #[must_use]
    pub fn node(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// All segments of the path, owner first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for StepPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<Vec<&str>> for StepPath {
    fn from(segments: Vec<&str>) -> Self {
        StepPath(segments.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_key_round_trips_through_serde() {
        let key = NodeKey::from("payments");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"payments\"");
        let back: NodeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn step_path_owner_and_display() {
        let path = StepPath::from_stack(&[NodeKey::from("n1")], "addition");
        assert_eq!(path.node(), "n1");
        assert_eq!(path.to_string(), "n1/addition");
        assert_eq!(path.segments(), &["n1".to_string(), "addition".to_string()]);
    }

    #[test]
    fn step_path_serializes_as_bare_array() {
        let path: StepPath = vec!["c", "need_number"].into();
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!(["c", "need_number"]));
        let back: StepPath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn empty_path_has_empty_owner() {
        let path = StepPath::new(vec![]);
        assert_eq!(path.node(), "");
    }
}
