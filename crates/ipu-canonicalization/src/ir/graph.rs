//! Arena-backed IR graph
//!
//! Nodes live in a vector and are addressed by [`NodeId`]. Removing a node leaves a vacant slot
//! so the ids of the remaining nodes never shift. Edges are stored twice, once on each end, and
//! the primitives of this module keep both ends in sync.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::node::{Node, NodeId, OpDesc, VarDesc};
use crate::error::{CanonicalizeError, Result};

/// IR graph owning every operation and variable node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted node will receive.
    pub fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len())
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Like [`get`](Self::get), failing on a removed or unknown id.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| CanonicalizeError::malformed_graph(format!("no node {id}")))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.get_mut(id)
            .ok_or_else(|| CanonicalizeError::malformed_graph(format!("no node {id}")))
    }

    /// Operator descriptor of `id`, failing when it is a variable.
    pub fn op(&self, id: NodeId) -> Result<&OpDesc> {
        self.node(id)?.op().ok_or_else(|| {
            CanonicalizeError::malformed_graph(format!("node {id} is not an operation"))
        })
    }

    pub fn op_mut(&mut self, id: NodeId) -> Result<&mut OpDesc> {
        self.node_mut(id)?.op_mut().ok_or_else(|| {
            CanonicalizeError::malformed_graph(format!("node {id} is not an operation"))
        })
    }

    /// Variable descriptor of `id`, failing when it is an operation.
    pub fn var(&self, id: NodeId) -> Result<&VarDesc> {
        self.node(id)?.var().ok_or_else(|| {
            CanonicalizeError::malformed_graph(format!("node {id} is not a variable"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|node| (NodeId(i), node)))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Some(node));
        id
    }

    /// Insert an operation node without edges.
    pub fn add_op(&mut self, op: OpDesc) -> NodeId {
        self.add_node(Node::operation(op))
    }

    /// Insert a variable node without edges.
    pub fn add_var(&mut self, var: VarDesc) -> NodeId {
        self.add_node(Node::variable(var))
    }

    /// Insert a host operation wired to existing variables, binding each slot to the names of
    /// the given variables.
    pub fn add_op_with_io(
        &mut self,
        mut op: OpDesc,
        inputs: &[(&str, &[NodeId])],
        outputs: &[(&str, &[NodeId])],
    ) -> Result<NodeId> {
        for (slot, vars) in inputs {
            let names = self.var_names(vars)?;
            op.inputs.entry(slot.to_string()).or_default().extend(names);
        }
        for (slot, vars) in outputs {
            let names = self.var_names(vars)?;
            op.outputs.entry(slot.to_string()).or_default().extend(names);
        }

        let id = self.add_op(op);
        for (_, vars) in inputs {
            for var in vars.iter() {
                self.connect(*var, id)?;
            }
        }
        for (_, vars) in outputs {
            for var in vars.iter() {
                self.connect(id, *var)?;
            }
        }
        Ok(id)
    }

    fn var_names(&self, vars: &[NodeId]) -> Result<Vec<String>> {
        vars.iter()
            .map(|var| self.var(*var).map(|var| var.name.clone()))
            .collect()
    }

    /// Add the edge `from -> to`.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if !self.contains(to) {
            return Err(CanonicalizeError::malformed_graph(format!("no node {to}")));
        }
        self.node_mut(from)?.outputs_mut().push(to);
        self.node_mut(to)?.inputs_mut().push(from);
        Ok(())
    }

    /// Remove every edge `from -> to`.
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if !self.contains(to) {
            return Err(CanonicalizeError::malformed_graph(format!("no node {to}")));
        }
        self.node_mut(from)?.outputs_mut().retain(|n| *n != to);
        self.node_mut(to)?.inputs_mut().retain(|n| *n != from);
        Ok(())
    }

    /// Drop every edge touching `id`, on both ends.
    pub fn clear_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.node_mut(id)?;
        let inputs = std::mem::take(node.inputs_mut());
        let outputs = std::mem::take(node.outputs_mut());

        for producer in inputs {
            if let Some(producer) = self.get_mut(producer) {
                producer.outputs_mut().retain(|n| *n != id);
            }
        }
        for consumer in outputs {
            if let Some(consumer) = self.get_mut(consumer) {
                consumer.inputs_mut().retain(|n| *n != id);
            }
        }
        Ok(())
    }

    /// Clear the edges of `id` and free its slot.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        self.clear_node(id)?;
        self.nodes[id.0]
            .take()
            .ok_or_else(|| CanonicalizeError::malformed_graph(format!("no node {id}")))
    }

    /// First variable named `name`.
    pub fn find_var(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.var().is_some_and(|var| var.name == name))
            .map(|(id, _)| id)
    }

    /// Operation nodes in topological order.
    ///
    /// Operations are ordered through the variables connecting them; ties are broken by
    /// ascending id so the order is deterministic.
    pub fn topological_ops(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        for (id, node) in self.iter().filter(|(_, node)| node.is_op()) {
            in_degree.insert(id, self.producer_ops(node).len());
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            for consumer in self.consumer_ops(self.node(id)?) {
                if let Some(degree) = in_degree.get_mut(&consumer) {
                    *degree = degree.checked_sub(1).ok_or_else(|| {
                        CanonicalizeError::malformed_graph(format!(
                            "edge into {consumer} is only recorded on its producer"
                        ))
                    })?;
                    if *degree == 0 {
                        ready.insert(consumer);
                    }
                }
            }
        }

        if order.len() != in_degree.len() {
            return Err(CanonicalizeError::malformed_graph(
                "operations form a cycle".to_string(),
            ));
        }
        Ok(order)
    }

    /// Distinct operations producing the inputs of `node`, one entry per edge path.
    fn producer_ops(&self, node: &Node) -> Vec<NodeId> {
        node.inputs()
            .iter()
            .filter_map(|var| self.get(*var))
            .flat_map(|var| var.inputs().iter().copied())
            .filter(|id| self.get(*id).is_some_and(Node::is_op))
            .collect()
    }

    fn consumer_ops(&self, node: &Node) -> Vec<NodeId> {
        node.outputs()
            .iter()
            .filter_map(|var| self.get(*var))
            .flat_map(|var| var.outputs().iter().copied())
            .filter(|id| self.get(*id).is_some_and(Node::is_op))
            .collect()
    }

    /// Check that every edge is recorded on both ends and points at a live node.
    pub fn validate_edges(&self) -> Result<()> {
        for (id, node) in self.iter() {
            for output in node.outputs() {
                let consumer = self.node(*output)?;
                if !consumer.inputs().contains(&id) {
                    return Err(CanonicalizeError::malformed_graph(format!(
                        "edge {id} -> {output} is missing its back-reference"
                    )));
                }
            }
            for input in node.inputs() {
                let producer = self.node(*input)?;
                if !producer.outputs().contains(&id) {
                    return Err(CanonicalizeError::malformed_graph(format!(
                        "edge {input} -> {id} is missing its forward reference"
                    )));
                }
            }
        }
        Ok(())
    }
}
