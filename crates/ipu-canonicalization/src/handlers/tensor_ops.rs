//! Handlers for tensor creation and tensor manipulation operators.

use crate::builder::{
    const_attr_map, const_attr_map_from_value, create_base_op, create_const, create_reshape,
};
use crate::dtype::{var_type_to_onnx_dtype, OnnxDataType, VarType};
use crate::error::{CanonicalizeError, Result};
use crate::ir::{attrs, AttributeValue, FromAttribute, Graph, NodeId};
use crate::utils::{first_output, input_node, input_node_shape, output_node};

fn widen(values: Vec<i32>) -> Vec<i64> {
    values.into_iter().map(i64::from).collect()
}

fn all_inputs(graph: &Graph, node: NodeId) -> Result<Vec<NodeId>> {
    Ok(graph.node(node)?.inputs().to_vec())
}

fn all_outputs(graph: &Graph, node: NodeId) -> Result<Vec<NodeId>> {
    Ok(graph.node(node)?.outputs().to_vec())
}

fn has_argument(graph: &Graph, node: NodeId, slot: &str) -> Result<bool> {
    Ok(!graph.op(node)?.input(slot).is_empty())
}

pub fn fill_constant_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    for slot in ["ShapeTensor", "ShapeTensorList"] {
        if has_argument(graph, node, slot)? {
            return Err(CanonicalizeError::unsupported(format!(
                "fill_constant with a {slot} input, only literal shapes are supported"
            )));
        }
    }

    let op = graph.op(node)?;
    let dtype: i32 = op.attr("dtype")?;
    let shape: Vec<i64> = op.attr("shape")?;
    let value: f32 = op.attr("value")?;
    if value.is_nan() {
        return Err(CanonicalizeError::unsupported(
            "fill_constant with a NaN value",
        ));
    }

    let dtype = VarType::try_from(dtype)?;
    let onnx_dtype = OnnxDataType::from(dtype);
    let attrs = match dtype {
        VarType::FP32 => const_attr_map_from_value(value, shape, onnx_dtype),
        VarType::FP64 => const_attr_map_from_value(f64::from(value), shape, onnx_dtype),
        VarType::INT32 => const_attr_map_from_value(value as i32, shape, onnx_dtype),
        VarType::INT64 => const_attr_map_from_value(value as i64, shape, onnx_dtype),
        other => {
            return Err(CanonicalizeError::unsupported(format!(
                "fill_constant with dtype {other}"
            )))
        }
    };

    let out = output_node(graph, "Out", node, 0)?;
    create_const(graph, &[], &[out], attrs)
}

pub fn gaussian_random_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let op = graph.op(node)?;
    let shape: Vec<i64> = op.attr("shape")?;
    let dtype = var_type_to_onnx_dtype(op.attr("dtype")?)?;
    let mean: f32 = op.attr("mean")?;
    let scale: f32 = op.attr("std")?;

    let out = output_node(graph, "Out", node, 0)?;
    create_base_op(
        graph,
        "RandomNormal",
        &[],
        &[out],
        attrs([
            ("shape", AttributeValue::from(shape)),
            ("dtype", dtype.into()),
            ("mean", mean.into()),
            ("scale", scale.into()),
        ]),
    )
}

pub fn uniform_random_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let op = graph.op(node)?;
    let shape: Vec<i64> = op.attr("shape")?;
    let dtype = var_type_to_onnx_dtype(op.attr("dtype")?)?;
    let high: f32 = op.attr("max")?;
    let low: f32 = op.attr("min")?;

    let out = output_node(graph, "Out", node, 0)?;
    create_base_op(
        graph,
        "RandomUniform",
        &[],
        &[out],
        attrs([
            ("shape", AttributeValue::from(shape)),
            ("dtype", dtype.into()),
            ("high", high.into()),
            ("low", low.into()),
        ]),
    )
}

pub fn transpose_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let axis = widen(graph.op(node)?.attr("axis")?);

    let inputs = all_inputs(graph, node)?;
    let outputs = all_outputs(graph, node)?;
    create_base_op(graph, "Transpose", &inputs, &outputs, attrs([("axis", axis)]))
}

pub fn reshape_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let shape = widen(graph.op(node)?.attr("shape")?);

    let x = input_node(graph, "X", node, 0)?;
    let out = output_node(graph, "Out", node, 0)?;
    create_reshape(graph, &[x], &[out], &shape)
}

pub fn gather_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let x = input_node(graph, "X", node, 0)?;
    let index = input_node(graph, "Index", node, 0)?;
    let out = output_node(graph, "Out", node, 0)?;
    create_base_op(graph, "Gather", &[x, index], &[out], Default::default())
}

pub fn squeeze_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let mut axes = widen(graph.op(node)?.attr("axes")?);
    if axes.is_empty() {
        // Squeeze every unit dimension of the static input shape.
        axes = input_node_shape(graph, "X", node, 0)?
            .iter()
            .enumerate()
            .filter(|(_, dim)| **dim == 1)
            .map(|(i, _)| i as i64)
            .collect();
        log::debug!("Inferred squeeze axes {axes:?} for {node}");
    }

    let x = input_node(graph, "X", node, 0)?;
    let out = output_node(graph, "Out", node, 0)?;
    create_base_op(graph, "Squeeze", &[x], &[out], attrs([("axes", axes)]))
}

/// The host type tag is forwarded as is, without checking the target supports it.
pub fn cast_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let to: i32 = graph.op(node)?.attr("out_dtype")?;

    let x = input_node(graph, "X", node, 0)?;
    let out = output_node(graph, "Out", node, 0)?;
    create_base_op(graph, "Cast", &[x], &[out], attrs([("to", to)]))
}

/// Embedding lookup: squeeze the trailing index dimension, then gather rows of the table.
pub fn lookup_table_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let ids = input_node(graph, "Ids", node, 0)?;
    let w = input_node(graph, "W", node, 0)?;
    let out = output_node(graph, "Out", node, 0)?;

    let squeeze = create_base_op(
        graph,
        "Squeeze",
        &[ids],
        &[],
        attrs([("axes", vec![-1i64])]),
    )?;
    let squeezed = first_output(graph, squeeze)?;
    create_base_op(graph, "Gather", &[w, squeezed], &[out], Default::default())
}

pub fn unsqueeze_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let axes = widen(graph.op(node)?.attr("axes")?);

    let x = input_node(graph, "X", node, 0)?;
    let outputs = all_outputs(graph, node)?;
    create_base_op(graph, "Unsqueeze", &[x], &outputs, attrs([("axes", axes)]))
}

pub fn concat_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let axis = i64::from(graph.op(node)?.attr::<i32>("axis")?);

    let inputs = all_inputs(graph, node)?;
    let outputs = all_outputs(graph, node)?;
    create_base_op(graph, "Concat", &inputs, &outputs, attrs([("axis", axis)]))
}

/// Stack is expressed as an unsqueeze of every input followed by a concat on the new axis.
pub fn stack_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let axis = i64::from(graph.op(node)?.attr::<i32>("axis")?);

    let inputs = all_inputs(graph, node)?;
    let y = output_node(graph, "Y", node, 0)?;

    let mut unsqueezed = Vec::with_capacity(inputs.len());
    for input in inputs {
        let unsqueeze = create_base_op(
            graph,
            "Unsqueeze",
            &[input],
            &[],
            attrs([("axes", vec![axis])]),
        )?;
        unsqueezed.push(first_output(graph, unsqueeze)?);
    }
    create_base_op(graph, "Concat", &unsqueezed, &[y], attrs([("axis", axis)]))
}

pub fn shape_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let inputs = all_inputs(graph, node)?;
    let outputs = all_outputs(graph, node)?;
    create_base_op(graph, "Shape", &inputs, &outputs, Default::default())
}

/// Slice takes starts, ends, axes and steps as tensors.
///
/// Starts and ends come from the `StartsTensor`/`EndsTensor` inputs when bound, otherwise from
/// int32 constants built out of the attributes. Steps are all ones, sized after the leading
/// entry of the `dims` of the operation producing ends, so ends must exist before steps are
/// built.
pub fn slice_handler(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let starts = if has_argument(graph, node, "StartsTensor")? {
        input_node(graph, "StartsTensor", node, 0)?
    } else {
        let values: Vec<i32> = graph.op(node)?.attr("starts")?;
        int32_const(graph, values)?
    };
    let ends = if has_argument(graph, node, "EndsTensor")? {
        input_node(graph, "EndsTensor", node, 0)?
    } else {
        let values: Vec<i32> = graph.op(node)?.attr("ends")?;
        int32_const(graph, values)?
    };
    let axes: Vec<i32> = graph.op(node)?.attr("axes")?;
    let axes = int32_const(graph, axes)?;

    let len = producer_dims(graph, ends)?.first().copied().unwrap_or(1);
    let steps = int32_const(graph, vec![1; len.max(0) as usize])?;

    let input = input_node(graph, "Input", node, 0)?;
    let outputs = all_outputs(graph, node)?;
    create_base_op(
        graph,
        "Slice",
        &[input, starts, ends, axes, steps],
        &outputs,
        Default::default(),
    )
}

/// Emit a one dimensional int32 `Constant` and return its output variable.
fn int32_const(graph: &mut Graph, values: Vec<i32>) -> Result<NodeId> {
    let dims = vec![values.len() as i64];
    let constant = create_const(
        graph,
        &[],
        &[],
        const_attr_map(values, dims, OnnxDataType::INT32),
    )?;
    first_output(graph, constant)
}

/// `dims` attribute of the operation producing `var`.
fn producer_dims(graph: &Graph, var: NodeId) -> Result<Vec<i64>> {
    match graph.node(var)?.inputs().first() {
        Some(producer) => graph.op(*producer)?.attr("dims"),
        None => Err(CanonicalizeError::MalformedAttribute {
            name: "dims".to_string(),
            expected: <Vec<i64> as FromAttribute>::KIND,
            found: "missing",
        }),
    }
}
