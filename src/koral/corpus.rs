//! Corpus-AST node types for the corpus-metadata dialect.
//!
//! Corpus constraints come in two wire spellings with identical structure:
//! `koral:doc`/`koral:docGroup` in virtual-corpus definitions and
//! `koral:field`/`koral:fieldGroup` in metadata responses. The node types
//! record which spelling they were read from so serialisation restores it.
//!
//! `koral:docGroupRef` nodes (and any other unknown corpus `@type`) are
//! opaque: they are carried through a rewrite pass untouched.

use serde_json::{Map, Value};
use smol_str::SmolStr;

use super::rewrite::Rewrite;

/// A node in a KoralQuery corpus tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CorpusNode {
    /// `koral:doc` / `koral:field` - a single metadata constraint.
    Field(CorpusField),
    /// `koral:docGroup` / `koral:fieldGroup` - an `and`/`or` combination.
    Group(CorpusGroup),
    /// `koral:docGroupRef` or any unknown corpus type, passed through.
    Opaque(OpaqueCorpus),
}

impl CorpusNode {
    /// Borrow this node as a field, if it is one.
    pub fn as_field(&self) -> Option<&CorpusField> {
        match self {
            Self::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Visit every field in the tree mutably, depth-first, left to right.
    pub fn walk_fields_mut(&mut self, visit: &mut impl FnMut(&mut CorpusField)) {
        match self {
            Self::Field(f) => visit(f),
            Self::Group(g) => {
                for op in &mut g.operands {
                    op.walk_fields_mut(visit);
                }
            }
            Self::Opaque(_) => {}
        }
    }
}

/// Which wire spelling a corpus node was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorpusTag {
    /// `koral:doc` / `koral:docGroup`.
    #[default]
    Doc,
    /// `koral:field` / `koral:fieldGroup`.
    Field,
}

/// Match operation of a corpus field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorpusMatch {
    Eq,
    Ne,
    Geq,
    Leq,
    Contains,
    Excludes,
}

impl CorpusMatch {
    /// The wire keyword, e.g. `match:contains`.
    pub fn as_koral(self) -> &'static str {
        match self {
            Self::Eq => "match:eq",
            Self::Ne => "match:ne",
            Self::Geq => "match:geq",
            Self::Leq => "match:leq",
            Self::Contains => "match:contains",
            Self::Excludes => "match:excludes",
        }
    }

    /// Parse a wire keyword, with or without the `match:` prefix.
    pub fn from_koral(s: &str) -> Option<Self> {
        Self::from_name(s.strip_prefix("match:").unwrap_or(s))
    }

    /// Parse a bare operation name as it appears in rule strings.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "geq" => Some(Self::Geq),
            "leq" => Some(Self::Leq),
            "contains" => Some(Self::Contains),
            "excludes" => Some(Self::Excludes),
            _ => None,
        }
    }
}

/// Value type of a corpus field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldValueType {
    String,
    Regex,
    Date,
}

impl FieldValueType {
    /// The wire keyword, e.g. `type:regex`.
    pub fn as_koral(self) -> &'static str {
        match self {
            Self::String => "type:string",
            Self::Regex => "type:regex",
            Self::Date => "type:date",
        }
    }

    /// Parse a wire keyword, with or without the `type:` prefix.
    pub fn from_koral(s: &str) -> Option<Self> {
        Self::from_name(s.strip_prefix("type:").unwrap_or(s))
    }

    /// Parse a bare type name as it appears in rule strings.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "regex" => Some(Self::Regex),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

/// A single metadata constraint.
///
/// The value is kept as raw JSON so numeric values (`pubDate=2020`)
/// round-trip without being re-typed; matching compares textual form.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusField {
    pub tag: CorpusTag,
    pub key: SmolStr,
    pub value: Value,
    pub match_op: Option<CorpusMatch>,
    pub value_type: Option<FieldValueType>,
    pub rewrites: Vec<Rewrite>,
}

impl CorpusField {
    /// Create a `koral:doc` field with a string value.
    pub fn new(key: impl Into<SmolStr>, value: impl Into<String>) -> Self {
        Self {
            tag: CorpusTag::Doc,
            key: key.into(),
            value: Value::String(value.into()),
            match_op: None,
            value_type: None,
            rewrites: Vec::new(),
        }
    }

    /// The textual form of the value, used for matching.
    pub fn value_text(&self) -> String {
        value_text(&self.value)
    }
}

/// The textual form of a field value: strings verbatim, scalars printed.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Group operation of a corpus group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupOp {
    And,
    Or,
}

impl GroupOp {
    /// The wire keyword, e.g. `operation:and`.
    pub fn as_koral(self) -> &'static str {
        match self {
            Self::And => "operation:and",
            Self::Or => "operation:or",
        }
    }

    /// Parse a wire keyword, with or without the `operation:` prefix.
    pub fn from_koral(s: &str) -> Option<Self> {
        match s.strip_prefix("operation:").unwrap_or(s) {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

/// An `and`/`or` combination of corpus constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusGroup {
    pub tag: CorpusTag,
    pub operation: GroupOp,
    pub operands: Vec<CorpusNode>,
    pub rewrites: Vec<Rewrite>,
}

impl CorpusGroup {
    /// Create a `koral:docGroup` from an operation and operands.
    pub fn new(operation: GroupOp, operands: Vec<CorpusNode>) -> Self {
        Self {
            tag: CorpusTag::Doc,
            operation,
            operands,
            rewrites: Vec::new(),
        }
    }
}

/// An opaque corpus node: the original object, key order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueCorpus {
    pub type_name: String,
    pub raw: Map<String, Value>,
}
