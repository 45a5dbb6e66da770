//! Error types for KoralQuery tree parsing and serialisation.

use thiserror::Error;

/// Errors that can occur while converting KoralQuery JSON to and from
/// the typed node trees.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KoralError {
    /// A node object is missing its `@type` discriminator.
    #[error("node is missing '@type'")]
    MissingType,

    /// A node object is missing a required field.
    #[error("{node} is missing required field '{field}'")]
    MissingField { node: &'static str, field: &'static str },

    /// A field has the wrong JSON shape (e.g. `operands` is not an array).
    #[error("invalid {node}: {message}")]
    Invalid { node: &'static str, message: String },

    /// An enumeration keyword was not recognised.
    #[error("unknown {kind} keyword '{value}'")]
    UnknownKeyword { kind: &'static str, value: String },

    /// The input was not a JSON object where one was required.
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// The node tree nests deeper than the parser is willing to follow.
    #[error("node tree nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

impl KoralError {
    /// Create a missing-field error.
    pub fn missing(node: &'static str, field: &'static str) -> Self {
        Self::MissingField { node, field }
    }

    /// Create an invalid-node error.
    pub fn invalid(node: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            node,
            message: message.into(),
        }
    }

    /// Create an unknown-keyword error.
    pub fn keyword(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownKeyword {
            kind,
            value: value.into(),
        }
    }
}
