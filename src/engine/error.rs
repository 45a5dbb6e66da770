//! Request-time error type of the mapping engine.

use thiserror::Error;

use crate::koral::KoralError;

/// A non-recoverable failure of a single mapping request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapperError {
    /// No mapping list is registered under the requested ID.
    #[error("mapping list with ID {0} not found")]
    UnknownList(String),

    /// The direction parameter is neither `atob` nor `btoa`.
    #[error("invalid direction '{0}'")]
    InvalidDirection(String),

    /// A cascade `cfg` entry does not follow the parameter syntax.
    #[error("invalid cfg entry '{0}'")]
    InvalidCfg(String),

    /// The input payload is not a well-formed KoralQuery tree.
    #[error("invalid input: {0}")]
    Input(#[from] KoralError),
}
