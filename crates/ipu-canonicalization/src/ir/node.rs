//! Graph node representation
//!
//! A node is either an operation, described by an [`OpDesc`], or a variable, described by a
//! [`VarDesc`]. Both variants carry ordered edge lists that refer to other nodes by [`NodeId`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::attribute::{get_attr, AttributeValue, Attributes, FromAttribute};
use crate::error::Result;

/// Stable index of a node inside a [`Graph`](super::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operator descriptor: a type name, named argument slots and attributes.
///
/// Slots map a parameter name such as `X` or `Out` to the names of the variables bound to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    pub op_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub attrs: Attributes,
}

impl OpDesc {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            ..Default::default()
        }
    }

    /// Variable names bound to input slot `slot`, empty when the slot is absent.
    pub fn input(&self, slot: &str) -> &[String] {
        self.inputs.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Variable names bound to output slot `slot`, empty when the slot is absent.
    pub fn output(&self, slot: &str) -> &[String] {
        self.outputs.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_input(&self, slot: &str) -> bool {
        self.inputs.contains_key(slot)
    }

    pub fn set_input(&mut self, slot: impl Into<String>, names: Vec<String>) {
        self.inputs.insert(slot.into(), names);
    }

    pub fn set_output(&mut self, slot: impl Into<String>, names: Vec<String>) {
        self.outputs.insert(slot.into(), names);
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Strictly typed attribute access.
    pub fn attr<T: FromAttribute>(&self, name: &str) -> Result<T> {
        get_attr(&self.attrs, name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set_input`](Self::set_input).
    pub fn with_input<S: Into<String>>(mut self, slot: &str, names: impl IntoIterator<Item = S>) -> Self {
        self.set_input(slot, names.into_iter().map(Into::into).collect());
        self
    }

    /// Builder-style variant of [`set_output`](Self::set_output).
    pub fn with_output<S: Into<String>>(mut self, slot: &str, names: impl IntoIterator<Item = S>) -> Self {
        self.set_output(slot, names.into_iter().map(Into::into).collect());
        self
    }

    /// Builder-style variant of [`set_attr`](Self::set_attr).
    pub fn with_attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set_attr(name, value);
        self
    }
}

/// Variable descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
pub struct VarDesc {
    pub name: String,
    /// Static shape, `-1` for dimensions unknown until runtime.
    #[new(default)]
    #[serde(default)]
    pub shape: Vec<i64>,
    /// Host element type tag, see [`VarType`](crate::dtype::VarType).
    #[new(value = "crate::dtype::VarType::FP32 as i32")]
    #[serde(default = "default_dtype")]
    pub dtype: i32,
    #[new(default)]
    #[serde(default)]
    pub persistable: bool,
    /// Constant payload, for weights and other folded values.
    #[new(default)]
    #[serde(default)]
    pub payload: Option<AttributeValue>,
}

fn default_dtype() -> i32 {
    crate::dtype::VarType::FP32 as i32
}

impl VarDesc {
    pub fn with_shape(mut self, shape: Vec<i64>) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_dtype(mut self, dtype: i32) -> Self {
        self.dtype = dtype;
        self
    }
}

/// A node of the IR graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Operation {
        op: OpDesc,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
    },
    Variable {
        var: VarDesc,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
    },
}

impl Node {
    pub fn operation(op: OpDesc) -> Self {
        Node::Operation {
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn variable(var: VarDesc) -> Self {
        Node::Variable {
            var,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Operator type for operations, variable name for variables.
    pub fn name(&self) -> &str {
        match self {
            Node::Operation { op, .. } => &op.op_type,
            Node::Variable { var, .. } => &var.name,
        }
    }

    pub fn is_op(&self) -> bool {
        matches!(self, Node::Operation { .. })
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Node::Variable { .. })
    }

    pub fn op(&self) -> Option<&OpDesc> {
        match self {
            Node::Operation { op, .. } => Some(op),
            Node::Variable { .. } => None,
        }
    }

    pub fn op_mut(&mut self) -> Option<&mut OpDesc> {
        match self {
            Node::Operation { op, .. } => Some(op),
            Node::Variable { .. } => None,
        }
    }

    pub fn var(&self) -> Option<&VarDesc> {
        match self {
            Node::Variable { var, .. } => Some(var),
            Node::Operation { .. } => None,
        }
    }

    pub fn inputs(&self) -> &[NodeId] {
        match self {
            Node::Operation { inputs, .. } | Node::Variable { inputs, .. } => inputs,
        }
    }

    pub fn outputs(&self) -> &[NodeId] {
        match self {
            Node::Operation { outputs, .. } | Node::Variable { outputs, .. } => outputs,
        }
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut Vec<NodeId> {
        match self {
            Node::Operation { inputs, .. } | Node::Variable { inputs, .. } => inputs,
        }
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut Vec<NodeId> {
        match self {
            Node::Operation { outputs, .. } | Node::Variable { outputs, .. } => outputs,
        }
    }
}
