/// Errors raised while canonicalizing a graph.
///
/// Every variant is fatal: the pass stops at the first error and hands it back to the caller.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizeError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("operator `{0}` is not supported on this backend")]
    UnregisteredOperator(String),

    #[error("attribute `{name}`: expected {expected}, found {found}")]
    MalformedAttribute {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("operator `{op}` has no argument at slot `{slot}`[{index}]")]
    MissingArgument {
        op: String,
        slot: String,
        index: usize,
    },

    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CanonicalizeError {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFeature(msg.into())
    }

    pub(crate) fn malformed_graph(msg: impl Into<String>) -> Self {
        Self::MalformedGraph(msg.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, CanonicalizeError>;
