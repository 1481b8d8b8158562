//! Op builder
//!
//! Emits target operations and variables with their edges wired. Handlers go through these
//! functions instead of touching the graph directly, so conventions of the target
//! representation (constant payload attributes, shape operands passed as tensors) live here.
//!
//! The builder does not validate what it is given: payload sizes, dims and attribute values
//! are the caller's responsibility.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::dtype::{var_type_to_pop_str, OnnxDataType};
use crate::error::Result;
use crate::ir::{attrs, AttributeValue, Attributes, Graph, NodeId, OpDesc, VarDesc};
use crate::utils::first_output;

/// Slot listing the inputs of a target operation.
pub const INPUTS_SLOT: &str = "__inputs__";
/// Slot listing the outputs of a target operation.
pub const OUTPUTS_SLOT: &str = "__outputs__";

static VAR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Generate a variable name unique within the process.
pub fn generate_var_name() -> String {
    let id = VAR_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("_gen_var_{id}")
}

/// Insert a fresh variable with a generated name and no edges.
pub fn make_var_node(graph: &mut Graph) -> NodeId {
    graph.add_var(VarDesc::new(generate_var_name()))
}

/// Insert an operation of type `op_type` consuming `inputs` and producing `outputs`.
///
/// When `outputs` is empty a fresh variable is created as the single output.
pub fn make_op_node(
    graph: &mut Graph,
    op_type: &str,
    inputs: &[NodeId],
    outputs: &[NodeId],
) -> Result<NodeId> {
    let op = graph.add_op(OpDesc::new(op_type));

    for input in inputs {
        graph.connect(*input, op)?;
    }
    if outputs.is_empty() {
        let var = make_var_node(graph);
        graph.connect(op, var)?;
    } else {
        for output in outputs {
            graph.connect(op, *output)?;
        }
    }

    let input_names = names_of(graph, graph.node(op)?.inputs())?;
    let output_names = names_of(graph, graph.node(op)?.outputs())?;
    let desc = graph.op_mut(op)?;
    desc.set_input(INPUTS_SLOT, input_names);
    desc.set_output(OUTPUTS_SLOT, output_names);

    Ok(op)
}

fn names_of(graph: &Graph, ids: &[NodeId]) -> Result<Vec<String>> {
    ids.iter()
        .map(|id| graph.node(*id).map(|node| node.name().to_string()))
        .collect()
}

/// [`make_op_node`] followed by attaching `attrs`.
pub fn create_base_op(
    graph: &mut Graph,
    op_type: &str,
    inputs: &[NodeId],
    outputs: &[NodeId],
    attrs: Attributes,
) -> Result<NodeId> {
    let op = make_op_node(graph, op_type, inputs, outputs)?;
    graph.op_mut(op)?.attrs.extend(attrs);

    log::trace!("Created {op_type} {op}");
    Ok(op)
}

/// Attributes of a `Constant` holding `value` with shape `dims`.
pub fn const_attr_map(
    value: impl Into<AttributeValue>,
    dims: Vec<i64>,
    dtype: OnnxDataType,
) -> Attributes {
    attrs([
        ("value", value.into()),
        ("dims", AttributeValue::Int64s(dims)),
        ("dtype", AttributeValue::Int32(dtype as i32)),
    ])
}

/// Attributes of a `Constant` filled with `value` repeated over the product of `dims`.
pub fn const_attr_map_from_value<T>(value: T, dims: Vec<i64>, dtype: OnnxDataType) -> Attributes
where
    T: Clone,
    Vec<T>: Into<AttributeValue>,
{
    let size: i64 = dims.iter().product();
    let values = vec![value; size.max(0) as usize];
    const_attr_map(values, dims, dtype)
}

/// Emit a `Constant` operation carrying an inline literal.
pub fn create_const(
    graph: &mut Graph,
    inputs: &[NodeId],
    outputs: &[NodeId],
    attrs: Attributes,
) -> Result<NodeId> {
    create_base_op(graph, "Constant", inputs, outputs, attrs)
}

/// Emit a `Cast` to the host element type `otype`.
pub fn create_cast(
    graph: &mut Graph,
    inputs: &[NodeId],
    outputs: &[NodeId],
    otype: i32,
) -> Result<NodeId> {
    let to = var_type_to_pop_str(otype)?;
    create_base_op(graph, "Cast", inputs, outputs, attrs([("to", to)]))
}

/// Optional attributes of a `Gemm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmAttrs {
    pub trans_a: i64,
    pub trans_b: i64,
    pub alpha: f32,
    pub beta: f32,
}

impl Default for GemmAttrs {
    fn default() -> Self {
        Self {
            trans_a: 0,
            trans_b: 0,
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

/// Emit a `Gemm` computing `alpha * A' * B' + beta * C`.
pub fn create_gemm(
    graph: &mut Graph,
    inputs: &[NodeId],
    outputs: &[NodeId],
    gemm: GemmAttrs,
) -> Result<NodeId> {
    let mut attrs = Attributes::new();
    attrs.insert("alpha".into(), gemm.alpha.into());
    attrs.insert("beta".into(), gemm.beta.into());
    attrs.insert("transA".into(), gemm.trans_a.into());
    attrs.insert("transB".into(), gemm.trans_b.into());
    create_base_op(graph, "Gemm", inputs, outputs, attrs)
}

/// Emit a `Reshape` of `inputs[0]` to `oshape`.
///
/// The target `Reshape` takes its shape as a second tensor operand, so a `Constant` holding
/// `oshape` is emitted first.
pub fn create_reshape(
    graph: &mut Graph,
    inputs: &[NodeId],
    outputs: &[NodeId],
    oshape: &[i64],
) -> Result<NodeId> {
    let data = *inputs.first().ok_or_else(|| {
        crate::error::CanonicalizeError::malformed_graph("Reshape needs a data input")
    })?;
    let shape = create_const(
        graph,
        &[],
        &[],
        const_attr_map(
            oshape.to_vec(),
            vec![oshape.len() as i64],
            OnnxDataType::INT64,
        ),
    )?;
    let shape = first_output(graph, shape)?;

    create_base_op(graph, "Reshape", &[data, shape], outputs, Attributes::new())
}

/// Optional attributes of a `Conv`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvAttrs {
    pub dilations: Vec<i64>,
    pub group: i64,
    pub kernel_shape: Vec<i64>,
    pub pads: Vec<i64>,
    pub strides: Vec<i64>,
}

impl Default for ConvAttrs {
    fn default() -> Self {
        Self {
            dilations: vec![1, 1],
            group: 1,
            kernel_shape: Vec::new(),
            pads: vec![0, 0, 0, 0],
            strides: vec![1, 1],
        }
    }
}

/// Emit a `Conv`.
pub fn create_conv(
    graph: &mut Graph,
    inputs: &[NodeId],
    outputs: &[NodeId],
    conv: ConvAttrs,
) -> Result<NodeId> {
    let ConvAttrs {
        dilations,
        group,
        kernel_shape,
        pads,
        strides,
    } = conv;
    let mut attrs = Attributes::new();
    attrs.insert("dilations".into(), dilations.into());
    attrs.insert("group".into(), group.into());
    attrs.insert("kernel_shape".into(), kernel_shape.into());
    attrs.insert("pads".into(), pads.into());
    attrs.insert("strides".into(), strides.into());
    create_base_op(graph, "Conv", inputs, outputs, attrs)
}
