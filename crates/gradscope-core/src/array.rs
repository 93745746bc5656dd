use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graph::GraphId;

// Array — Graph associations of a tracked value
//
// Resolution only needs to know which graphs an array belongs to, so the
// array type itself stays outside this crate behind the GraphTracked trait.
// Any value that can list its graph ids can be asked "does this need
// backprop".
//
// Array / ArrayNode are the minimal concrete collaborator: an array holds
// one node per graph it participates in, in the order the graphs were
// attached. Nodes are Arc-shared so cloning an Array is cheap and clones see
// the same nodes.

/// A value associated with zero or more computation graphs.
pub trait GraphTracked {
    /// Graph ids of the value's graph-association nodes, in order.
    fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_;
}

impl GraphTracked for [GraphId] {
    fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.iter().copied()
    }
}

/// Association of an array with one computation graph.
#[derive(Debug, PartialEq, Eq)]
pub struct ArrayNode {
    graph_id: GraphId,
}

impl ArrayNode {
    pub fn new(graph_id: GraphId) -> Self {
        ArrayNode { graph_id }
    }

    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }
}

/// Array handle carrying its graph-association nodes.
///
/// # Example
/// ```ignore
/// let mut x = Array::new();
/// x.require_grad(GraphId::DEFAULT)?;
/// assert!(is_array_backprop_required(&x));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Array {
    nodes: Vec<Arc<ArrayNode>>,
}

impl Array {
    /// An array that belongs to no graph.
    pub fn new() -> Self {
        Array { nodes: Vec::new() }
    }

    /// An array with one node per graph in `graph_ids`.
    pub fn with_graphs(graph_ids: &[GraphId]) -> Result<Self> {
        let mut array = Array::new();
        for &graph_id in graph_ids {
            array.require_grad(graph_id)?;
        }
        Ok(array)
    }

    /// Attach the array to `graph_id`.
    ///
    /// An array has at most one node per graph; attaching twice is an error.
    pub fn require_grad(&mut self, graph_id: GraphId) -> Result<()> {
        if self.is_grad_required(graph_id) {
            return Err(Error::GradAlreadyRequired { graph_id });
        }
        self.nodes.push(Arc::new(ArrayNode::new(graph_id)));
        Ok(())
    }

    /// Whether the array has a node on `graph_id`.
    ///
    /// This is about membership only; whether gradients are recorded right
    /// now is decided by the backprop mode.
    pub fn is_grad_required(&self, graph_id: GraphId) -> bool {
        self.nodes.iter().any(|node| node.graph_id() == graph_id)
    }

    pub fn nodes(&self) -> &[Arc<ArrayNode>] {
        &self.nodes
    }
}

impl GraphTracked for Array {
    fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.nodes.iter().map(|node| node.graph_id())
    }
}
