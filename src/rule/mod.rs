//! Mapping-rule grammar and parsers.
//!
//! A rule is a pair of subtrees separated by `<>`: the upper (A) side and
//! the lower (B) side. Direction `atob` matches the upper side and builds
//! the lower; `btoa` swaps the two. Two dialects exist:
//!
//! - annotation rules, `[ expr ] <> [ expr ]`, parsed by a logos lexer and
//!   a recursive-descent parser into query-AST subtrees;
//! - corpus rules, `field <> (field & field)`, parsed by a small scanner
//!   into corpus-AST subtrees.
//!
//! Unspecified foundries and layers are filled from the mapping list's
//! side defaults at parse time; the terms remember which fields were
//! filled so overrides can later distinguish them from explicit values.

pub mod annotation;
pub mod corpus;
pub mod error;
pub mod lexer;

use smol_str::SmolStr;

use crate::koral::{CorpusNode, QueryNode};

pub use annotation::parse_annotation_rule;
pub use corpus::parse_corpus_rule;
pub use error::RuleParseError;

/// Side defaults of a mapping list, filled into rules at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListDefaults {
    pub foundry_a: SmolStr,
    pub layer_a: SmolStr,
    pub foundry_b: SmolStr,
    pub layer_b: SmolStr,
    pub field_a: SmolStr,
    pub field_b: SmolStr,
}

impl ListDefaults {
    /// True when the given token names one of the default layers. The
    /// `layer=key` rule form is only recognised for such tokens.
    pub fn is_default_layer(&self, token: &str) -> bool {
        (!self.layer_a.is_empty() && self.layer_a == token)
            || (!self.layer_b.is_empty() && self.layer_b == token)
    }
}

/// Which side of a rule a subtree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

/// A parsed annotation rule: a pair of query-AST subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRule {
    pub upper: QueryNode,
    pub lower: QueryNode,
}

/// A parsed corpus rule: a pair of corpus-AST subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusRule {
    pub upper: CorpusNode,
    pub lower: CorpusNode,
}

/// A rule of either dialect, as stored in a mapping list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListRule {
    Annotation(AnnotationRule),
    Corpus(CorpusRule),
}
