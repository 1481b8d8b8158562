//! Intermediate representation of the graph being rewritten.

mod attribute;
mod graph;
mod node;

pub use attribute::{attrs, get_attr, AttributeValue, Attributes, FromAttribute};
pub use graph::Graph;
pub use node::{Node, NodeId, OpDesc, VarDesc};
