#![warn(missing_debug_implementations)]

//! Canonicalization of host framework graphs for the IPU backend.
//!
//! A [`CanonicalizationPass`] walks the operations of a [`Graph`](ir::Graph) in topological order
//! and hands each one to the handler registered for its type in a [`HandlerRegistry`]. Handlers
//! emit equivalent operations of the target representation through the [`builder`] functions,
//! then the pass deletes the source operation.
//!
//! ```no_run
//! use ipu_canonicalization::{ir::Graph, CanonicalizationPass, HandlerRegistry};
//!
//! # fn run(mut graph: Graph) -> ipu_canonicalization::Result<()> {
//! let registry = HandlerRegistry::with_default_handlers();
//! let report = CanonicalizationPass::new()
//!     .ignore_op("print")
//!     .run(&mut graph, &registry)?;
//! println!("{} operations rewritten", report.rewritten);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate derive_new;

pub mod builder;
pub mod dtype;
pub mod handlers;
pub mod ir;
pub mod registry;
pub mod utils;

mod error;
mod logger;
mod pass;

pub use error::{CanonicalizeError, Result};
pub use logger::{init_log, LoggerError};
pub use pass::{CanonicalizationPass, PassReport};
pub use registry::{Handler, HandlerRegistry, SymbolHandler};
