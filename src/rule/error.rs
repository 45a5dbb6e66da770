//! Error type for mapping-rule parsing.

use thiserror::Error;

/// A failure to parse a mapping rule string.
///
/// Carries the offending rule so startup diagnostics can point at the
/// exact list entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    /// A character outside the rule grammar's alphabet.
    #[error("unexpected character at offset {offset} in rule '{rule}'")]
    Lex { rule: String, offset: usize },

    /// A structural error (unbalanced brackets, mixed operators, ...).
    #[error("{message} in rule '{rule}'")]
    Syntax { rule: String, message: String },
}

impl RuleParseError {
    /// Create a lexical error.
    pub fn lex(rule: impl Into<String>, offset: usize) -> Self {
        Self::Lex {
            rule: rule.into(),
            offset,
        }
    }

    /// Create a syntax error.
    pub fn syntax(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            rule: rule.into(),
            message: message.into(),
        }
    }
}
