//! Lookups shared by the handlers
//!
//! Host operations name their arguments through slots (`X`, `Index`, `Out`, ...). These helpers
//! resolve a slot entry to the variable node actually connected to the operation.

use crate::error::{CanonicalizeError, Result};
use crate::ir::{Graph, NodeId};

/// Variable bound to input slot `slot` at position `index` of operation `node`.
pub fn input_node(graph: &Graph, slot: &str, node: NodeId, index: usize) -> Result<NodeId> {
    let op = graph.op(node)?;
    let missing = || CanonicalizeError::MissingArgument {
        op: op.op_type.clone(),
        slot: slot.to_string(),
        index,
    };
    let name = op.input(slot).get(index).ok_or_else(missing)?;
    in_var(graph, node, name).ok_or_else(missing)
}

/// Variable bound to output slot `slot` at position `index` of operation `node`.
pub fn output_node(graph: &Graph, slot: &str, node: NodeId, index: usize) -> Result<NodeId> {
    let op = graph.op(node)?;
    let missing = || CanonicalizeError::MissingArgument {
        op: op.op_type.clone(),
        slot: slot.to_string(),
        index,
    };
    let name = op.output(slot).get(index).ok_or_else(missing)?;
    out_var(graph, node, name).ok_or_else(missing)
}

/// Input of `node` named `var_name`.
pub fn in_var(graph: &Graph, node: NodeId, var_name: &str) -> Option<NodeId> {
    graph.get(node)?.inputs().iter().copied().find(|id| {
        graph
            .get(*id)
            .and_then(|n| n.var())
            .is_some_and(|var| var.name == var_name)
    })
}

/// Output of `node` named `var_name`.
pub fn out_var(graph: &Graph, node: NodeId, var_name: &str) -> Option<NodeId> {
    graph.get(node)?.outputs().iter().copied().find(|id| {
        graph
            .get(*id)
            .and_then(|n| n.var())
            .is_some_and(|var| var.name == var_name)
    })
}

/// Static shape of the variable bound to input slot `slot`.
pub fn input_node_shape(graph: &Graph, slot: &str, node: NodeId, index: usize) -> Result<Vec<i64>> {
    let var = input_node(graph, slot, node, index)?;
    Ok(graph.var(var)?.shape.clone())
}

/// Static shape of the variable bound to output slot `slot`.
pub fn output_node_shape(
    graph: &Graph,
    slot: &str,
    node: NodeId,
    index: usize,
) -> Result<Vec<i64>> {
    let var = output_node(graph, slot, node, index)?;
    Ok(graph.var(var)?.shape.clone())
}

/// First output of `node`.
pub fn first_output(graph: &Graph, node: NodeId) -> Result<NodeId> {
    graph.node(node)?.outputs().first().copied().ok_or_else(|| {
        CanonicalizeError::malformed_graph(format!("node {node} has no output"))
    })
}

/// Copy attribute `name` from operation `from` to operation `to`.
///
/// Nothing happens when `from` lacks the attribute. An attribute already present on `to` is
/// only replaced when `overwrite` is set. Returns whether a copy happened.
pub fn copy_op_attr(
    graph: &mut Graph,
    name: &str,
    from: NodeId,
    to: NodeId,
    overwrite: bool,
) -> Result<bool> {
    let Some(value) = graph.op(from)?.attrs.get(name).cloned() else {
        return Ok(false);
    };
    let target = graph.op_mut(to)?;
    if target.has_attr(name) && !overwrite {
        return Ok(false);
    }
    target.set_attr(name, value);
    Ok(true)
}
