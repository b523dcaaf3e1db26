//! Error types for graph construction and document handling.
//!
//! Every error is detected while building or parsing a document and is
//! fatal to the current invocation. Nothing here is retried; retries belong
//! to the provisioning engine's apply step.

use thiserror::Error;

/// Errors that can occur while declaring, validating or parsing a stack.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A resource with this logical name already exists in the graph
    #[error("duplicate resource name '{name}' (already declared as {existing})")]
    DuplicateName {
        /// The logical name that was declared twice
        name: String,
        /// Address of the resource that already holds the name
        existing: String,
    },

    /// An output with this name already exists
    #[error("duplicate output '{0}'")]
    DuplicateOutput(String),

    /// An input variable with this name already exists
    #[error("duplicate variable '{0}'")]
    DuplicateVariable(String),

    /// The name is not a valid engine identifier
    #[error("invalid name '{0}': must match [A-Za-z_][A-Za-z0-9_-]*")]
    InvalidName(String),

    /// A handle or reference points at a resource this graph never declared
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// A placeholder points at an undeclared input variable
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// The reference graph contains a cycle
    #[error("cyclic reference: {}", .cycle.join(" -> "))]
    CyclicReference {
        /// Addresses along the cycle, first and last entries are equal
        cycle: Vec<String>,
    },

    /// A property required by the resource kind is absent or null
    #[error("{address} is missing required property '{property}'")]
    MissingProperty {
        /// Address of the incomplete resource
        address: String,
        /// Name of the absent property
        property: String,
    },

    /// Resource kind string not recognised
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    /// A document does not follow the engine schema
    #[error("invalid document: {0}")]
    Parse(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl Error {
    /// Whether the error comes from graph validation at build time
    /// rather than from declaration or parsing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownResource(_)
                | Self::UnknownVariable(_)
                | Self::CyclicReference { .. }
                | Self::MissingProperty { .. }
        )
    }
}

/// Result type for stackgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
