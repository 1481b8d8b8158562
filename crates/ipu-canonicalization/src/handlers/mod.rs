//! Canonicalization handlers shipped with the crate.
//!
//! Every handler reads the attributes of one host operation, emits the equivalent target
//! operations wired to the existing input and output variables, and returns the last
//! operation it created.

mod tensor_ops;

use std::sync::Arc;

use crate::registry::SymbolHandler;

pub use tensor_ops::*;

macro_rules! handlers {
    ($($name:literal => $handler:path),* $(,)?) => {
        vec![$(($name, Arc::new($handler) as SymbolHandler)),*]
    };
}

/// `(operator type, handler)` pairs for every handler of this crate.
pub fn default_handlers() -> Vec<(&'static str, SymbolHandler)> {
    handlers![
        "fill_constant" => fill_constant_handler,
        "gaussian_random" => gaussian_random_handler,
        "uniform_random" => uniform_random_handler,
        "transpose2" => transpose_handler,
        "reshape2" => reshape_handler,
        "gather" => gather_handler,
        "squeeze2" => squeeze_handler,
        "cast" => cast_handler,
        "lookup_table" => lookup_table_handler,
        "unsqueeze2" => unsqueeze_handler,
        "concat" => concat_handler,
        "stack" => stack_handler,
        "shape" => shape_handler,
        "slice" => slice_handler,
    ]
}
