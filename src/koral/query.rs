//! Query-AST node types for the annotation dialect.
//!
//! A KoralQuery query tree is built from four node kinds, discriminated by
//! the `@type` field on the wire:
//!
//! ```json
//! {
//!   "@type": "koral:token",
//!   "wrap": {
//!     "@type": "koral:term",
//!     "foundry": "opennlp",
//!     "layer": "p",
//!     "key": "PIDAT",
//!     "match": "match:eq"
//!   }
//! }
//! ```
//!
//! Unrecognised `@type` values are wrapped in [`Catchall`] nodes that keep
//! the original JSON object, so foreign node kinds survive a rewrite pass
//! untouched.

use serde_json::{Map, Value};
use smol_str::SmolStr;

use super::rewrite::Rewrite;

/// A node in a KoralQuery query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// `koral:token` - a single word position wrapping one constraint tree.
    Token(Token),
    /// `koral:termGroup` - a Boolean combination of constraints.
    TermGroup(TermGroup),
    /// `koral:term` - a single annotation constraint.
    Term(Term),
    /// Any other `@type`, preserved verbatim.
    Catchall(Catchall),
}

impl QueryNode {
    /// The wire name of this node's type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Token(_) => "koral:token",
            Self::TermGroup(_) => "koral:termGroup",
            Self::Term(_) => "koral:term",
            Self::Catchall(c) => &c.type_name,
        }
    }

    /// Borrow this node as a term, if it is one.
    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Self::Term(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow this node as a term group, if it is one.
    pub fn as_term_group(&self) -> Option<&TermGroup> {
        match self {
            Self::TermGroup(g) => Some(g),
            _ => None,
        }
    }

    /// Visit every term in the tree, depth-first, left to right.
    pub fn walk_terms<'a>(&'a self, visit: &mut impl FnMut(&'a Term)) {
        match self {
            Self::Term(t) => visit(t),
            Self::Token(t) => t.wrap.walk_terms(visit),
            Self::TermGroup(g) => {
                for op in &g.operands {
                    op.walk_terms(visit);
                }
            }
            Self::Catchall(c) => {
                if let Some(wrap) = &c.wrap {
                    wrap.walk_terms(visit);
                }
                for op in c.operands.iter().flatten() {
                    op.walk_terms(visit);
                }
            }
        }
    }

    /// Visit every term in the tree mutably, depth-first, left to right.
    pub fn walk_terms_mut(&mut self, visit: &mut impl FnMut(&mut Term)) {
        match self {
            Self::Term(t) => visit(t),
            Self::Token(t) => t.wrap.walk_terms_mut(visit),
            Self::TermGroup(g) => {
                for op in &mut g.operands {
                    op.walk_terms_mut(visit);
                }
            }
            Self::Catchall(c) => {
                if let Some(wrap) = &mut c.wrap {
                    wrap.walk_terms_mut(visit);
                }
                for op in c.operands.iter_mut().flatten() {
                    op.walk_terms_mut(visit);
                }
            }
        }
    }
}

/// `koral:token` - wraps exactly one constraint tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub wrap: Box<QueryNode>,
    pub rewrites: Vec<Rewrite>,
}

/// `koral:termGroup` - an `and`/`or` combination of one or more operands.
#[derive(Debug, Clone, PartialEq)]
pub struct TermGroup {
    pub relation: Relation,
    pub operands: Vec<QueryNode>,
    pub rewrites: Vec<Rewrite>,
}

impl TermGroup {
    /// Create a group from a relation and operands.
    pub fn new(relation: Relation, operands: Vec<QueryNode>) -> Self {
        Self {
            relation,
            operands,
            rewrites: Vec::new(),
        }
    }
}

/// Relation of a term group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    And,
    Or,
}

impl Relation {
    /// The wire keyword, e.g. `relation:and`.
    pub fn as_koral(self) -> &'static str {
        match self {
            Self::And => "relation:and",
            Self::Or => "relation:or",
        }
    }

    /// Parse a wire keyword, with or without the `relation:` prefix.
    pub fn from_koral(s: &str) -> Option<Self> {
        match s.strip_prefix("relation:").unwrap_or(s) {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

/// Match operation of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TermMatch {
    #[default]
    Eq,
    Ne,
}

impl TermMatch {
    /// The wire keyword, e.g. `match:eq`.
    pub fn as_koral(self) -> &'static str {
        match self {
            Self::Eq => "match:eq",
            Self::Ne => "match:ne",
        }
    }

    /// Parse a wire keyword, with or without the `match:` prefix.
    pub fn from_koral(s: &str) -> Option<Self> {
        match s.strip_prefix("match:").unwrap_or(s) {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            _ => None,
        }
    }
}

/// `koral:term` - one annotation constraint.
///
/// Empty `foundry`/`layer`/`value` mean "unspecified". In a rule pattern an
/// unspecified field matches anything; in a parsed query it simply was not
/// present on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Term {
    pub foundry: SmolStr,
    pub layer: SmolStr,
    pub key: SmolStr,
    pub value: SmolStr,
    pub match_op: Option<TermMatch>,
    pub rewrites: Vec<Rewrite>,
    /// True when the foundry was filled from a mapping-list default rather
    /// than written in the rule. Never set on parsed queries, never
    /// serialised.
    pub implicit_foundry: bool,
    /// Like `implicit_foundry`, for the layer.
    pub implicit_layer: bool,
}

impl Term {
    /// Create a term with just a key.
    pub fn with_key(key: impl Into<SmolStr>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

/// A node of unknown `@type`, preserved verbatim.
///
/// The original JSON object is kept as-is; `wrap` and `operands` children
/// are additionally parsed when possible so rewriting can descend into
/// them. Serialisation starts from the raw object and re-emits parsed
/// children in place, keeping the key set bit-identical.
#[derive(Debug, Clone, PartialEq)]
pub struct Catchall {
    /// The original `@type` string.
    pub type_name: String,
    /// The complete original object, key order preserved.
    pub raw: Map<String, Value>,
    /// Parsed `wrap` child, when it parsed cleanly.
    pub wrap: Option<Box<QueryNode>>,
    /// Parsed `operands` children, when they parsed cleanly.
    pub operands: Option<Vec<QueryNode>>,
}
