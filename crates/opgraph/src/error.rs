//! Error taxonomy shared by every phase of graph construction.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Result alias used throughout the graph frontend.
pub type GraphResult<T> = Result<T, GraphError>;

/// Identifies which step of the node pipeline produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreValidate,
    ExpandAndInfer,
    PostValidate,
    CreateTensors,
    CreateOperations,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PreValidate => "pre-validate",
            Phase::ExpandAndInfer => "expand-and-infer",
            Phase::PostValidate => "post-validate",
            Phase::CreateTensors => "create-tensors",
            Phase::CreateOperations => "create-operations",
        };
        f.write_str(name)
    }
}

/// Errors surfaced while assembling and lowering an operator graph.
///
/// Validation failures propagate immediately; there is no aggregation of
/// multiple failures in one pass. Backend failures are wrapped at the
/// adapter boundary so callers never see a backend-specific error type.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A required slot is missing or an attribute/tensor is malformed or
    /// left unresolved where a resolved value was required.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A backend builder call failed; carries the backend's status code.
    #[error("backend error (status {status}): {message}")]
    Backend { status: i32, message: String },

    /// A phase failed for a specific node. The assembler wraps phase
    /// errors exactly once so callers learn which node aborted the build.
    #[error("{phase} failed for node `{node}`: {source}")]
    Phase {
        node: String,
        phase: Phase,
        #[source]
        source: Box<GraphError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        GraphError::InvalidInput(message.into())
    }

    /// Wraps this error with the node and phase it occurred in.
    pub(crate) fn in_phase(self, node: &str, phase: Phase) -> Self {
        GraphError::Phase {
            node: node.to_string(),
            phase,
            source: Box::new(self),
        }
    }

    /// Returns the underlying error with `Phase` wrappers stripped.
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::Phase { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<BackendError> for GraphError {
    fn from(err: BackendError) -> Self {
        GraphError::Backend {
            status: err.status,
            message: err.message,
        }
    }
}
