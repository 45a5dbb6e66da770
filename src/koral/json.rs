//! KoralQuery JSON parsing and serialisation.
//!
//! Converts between `serde_json::Value` trees and the typed node trees by
//! walking values directly. Known `@type`s become typed nodes; anything
//! else becomes a [`Catchall`] (query dialect) or [`OpaqueCorpus`] (corpus
//! dialect) that keeps the original object, so serialising an unchanged
//! tree reproduces the input key set bit-identically.

use serde_json::{Map, Value};
use smol_str::SmolStr;

use super::corpus::{
    CorpusField, CorpusGroup, CorpusMatch, CorpusNode, CorpusTag, FieldValueType, GroupOp,
    OpaqueCorpus,
};
use super::error::KoralError;
use super::query::{Catchall, QueryNode, Relation, Term, TermGroup, TermMatch, Token};
use super::rewrite::{rewrites_from_json, rewrites_to_json};

/// Nesting cap for incoming trees. Real queries stay in single digits;
/// the cap only guards against pathological input blowing the stack.
const MAX_DEPTH: usize = 128;

fn check_depth(depth: usize) -> Result<(), KoralError> {
    if depth > MAX_DEPTH {
        return Err(KoralError::TooDeep { limit: MAX_DEPTH });
    }
    Ok(())
}

// =============================================================================
// Query dialect
// =============================================================================

/// Parse a query tree from JSON.
pub fn query_from_json(value: &Value) -> Result<QueryNode, KoralError> {
    query_at(value, 0)
}

fn query_at(value: &Value, depth: usize) -> Result<QueryNode, KoralError> {
    check_depth(depth)?;
    let obj = as_object(value)?;
    let type_name = node_type(obj)?;

    match type_name {
        "koral:token" => {
            let wrap = obj
                .get("wrap")
                .ok_or(KoralError::missing("koral:token", "wrap"))?;
            Ok(QueryNode::Token(Token {
                wrap: Box::new(query_at(wrap, depth + 1)?),
                rewrites: rewrites_from_json(obj.get("rewrites")),
            }))
        }
        "koral:termGroup" => {
            let relation = obj
                .get("relation")
                .and_then(Value::as_str)
                .ok_or(KoralError::missing("koral:termGroup", "relation"))?;
            let relation = Relation::from_koral(relation)
                .ok_or_else(|| KoralError::keyword("relation", relation))?;

            let operands = obj
                .get("operands")
                .and_then(Value::as_array)
                .ok_or(KoralError::missing("koral:termGroup", "operands"))?;
            if operands.is_empty() {
                return Err(KoralError::invalid("koral:termGroup", "empty operands"));
            }
            let operands = operands
                .iter()
                .map(|op| query_at(op, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(QueryNode::TermGroup(TermGroup {
                relation,
                operands,
                rewrites: rewrites_from_json(obj.get("rewrites")),
            }))
        }
        "koral:term" => {
            let key = text_field(obj, "key");
            if key.is_empty() {
                return Err(KoralError::missing("koral:term", "key"));
            }
            let match_op = match obj.get("match").and_then(Value::as_str) {
                None => None,
                Some(m) => Some(
                    TermMatch::from_koral(m).ok_or_else(|| KoralError::keyword("match", m))?,
                ),
            };
            Ok(QueryNode::Term(Term {
                foundry: text_field(obj, "foundry"),
                layer: text_field(obj, "layer"),
                key,
                value: text_field(obj, "value"),
                match_op,
                rewrites: rewrites_from_json(obj.get("rewrites")),
                implicit_foundry: false,
                implicit_layer: false,
            }))
        }
        other => Ok(QueryNode::Catchall(parse_catchall(other, obj, depth))),
    }
}

/// Parse the recursable children of an unknown node, best-effort: children
/// that do not parse are left in the raw object only.
fn parse_catchall(type_name: &str, obj: &Map<String, Value>, depth: usize) -> Catchall {
    let wrap = obj
        .get("wrap")
        .and_then(|w| query_at(w, depth + 1).ok())
        .map(Box::new);
    let operands = obj.get("operands").and_then(Value::as_array).and_then(|ops| {
        ops.iter()
            .map(|op| query_at(op, depth + 1).ok())
            .collect::<Option<Vec<_>>>()
    });
    Catchall {
        type_name: type_name.to_string(),
        raw: obj.clone(),
        wrap,
        operands,
    }
}

/// Serialise a query tree to JSON.
pub fn query_to_json(node: &QueryNode) -> Value {
    match node {
        QueryNode::Token(token) => {
            let mut obj = Map::new();
            obj.insert("@type".into(), "koral:token".into());
            obj.insert("wrap".into(), query_to_json(&token.wrap));
            if let Some(rewrites) = rewrites_to_json(&token.rewrites) {
                obj.insert("rewrites".into(), rewrites);
            }
            Value::Object(obj)
        }
        QueryNode::TermGroup(group) => {
            let mut obj = Map::new();
            obj.insert("@type".into(), "koral:termGroup".into());
            obj.insert("relation".into(), group.relation.as_koral().into());
            obj.insert(
                "operands".into(),
                Value::Array(group.operands.iter().map(query_to_json).collect()),
            );
            if let Some(rewrites) = rewrites_to_json(&group.rewrites) {
                obj.insert("rewrites".into(), rewrites);
            }
            Value::Object(obj)
        }
        QueryNode::Term(term) => {
            let mut obj = Map::new();
            obj.insert("@type".into(), "koral:term".into());
            for (name, field) in [
                ("foundry", &term.foundry),
                ("layer", &term.layer),
                ("key", &term.key),
                ("value", &term.value),
            ] {
                if !field.is_empty() {
                    obj.insert(name.into(), Value::String(field.to_string()));
                }
            }
            if let Some(m) = term.match_op {
                obj.insert("match".into(), m.as_koral().into());
            }
            if let Some(rewrites) = rewrites_to_json(&term.rewrites) {
                obj.insert("rewrites".into(), rewrites);
            }
            Value::Object(obj)
        }
        QueryNode::Catchall(catchall) => {
            let mut obj = catchall.raw.clone();
            if let Some(wrap) = &catchall.wrap {
                obj.insert("wrap".into(), query_to_json(wrap));
            }
            if let Some(operands) = &catchall.operands {
                obj.insert(
                    "operands".into(),
                    Value::Array(operands.iter().map(query_to_json).collect()),
                );
            }
            Value::Object(obj)
        }
    }
}

// =============================================================================
// Corpus dialect
// =============================================================================

/// Parse a corpus tree from JSON.
pub fn corpus_from_json(value: &Value) -> Result<CorpusNode, KoralError> {
    corpus_at(value, 0)
}

fn corpus_at(value: &Value, depth: usize) -> Result<CorpusNode, KoralError> {
    check_depth(depth)?;
    let obj = as_object(value)?;
    let type_name = node_type(obj)?;

    match type_name {
        "koral:doc" | "koral:field" => {
            let tag = if type_name == "koral:field" {
                CorpusTag::Field
            } else {
                CorpusTag::Doc
            };
            let key = text_field(obj, "key");
            if key.is_empty() {
                return Err(KoralError::missing("koral:doc", "key"));
            }
            let match_op = match obj.get("match").and_then(Value::as_str) {
                None => None,
                Some(m) => Some(
                    CorpusMatch::from_koral(m).ok_or_else(|| KoralError::keyword("match", m))?,
                ),
            };
            let value_type = match obj.get("type").and_then(Value::as_str) {
                None => None,
                Some(t) => Some(
                    FieldValueType::from_koral(t)
                        .ok_or_else(|| KoralError::keyword("type", t))?,
                ),
            };
            Ok(CorpusNode::Field(CorpusField {
                tag,
                key,
                value: obj.get("value").cloned().unwrap_or(Value::Null),
                match_op,
                value_type,
                rewrites: rewrites_from_json(obj.get("rewrites")),
            }))
        }
        "koral:docGroup" | "koral:fieldGroup" => {
            let tag = if type_name == "koral:fieldGroup" {
                CorpusTag::Field
            } else {
                CorpusTag::Doc
            };
            let operation = obj
                .get("operation")
                .and_then(Value::as_str)
                .ok_or(KoralError::missing("koral:docGroup", "operation"))?;
            let operation = GroupOp::from_koral(operation)
                .ok_or_else(|| KoralError::keyword("operation", operation))?;

            let operands = obj
                .get("operands")
                .and_then(Value::as_array)
                .ok_or(KoralError::missing("koral:docGroup", "operands"))?;
            if operands.is_empty() {
                return Err(KoralError::invalid("koral:docGroup", "empty operands"));
            }
            let operands = operands
                .iter()
                .map(|op| corpus_at(op, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(CorpusNode::Group(CorpusGroup {
                tag,
                operation,
                operands,
                rewrites: rewrites_from_json(obj.get("rewrites")),
            }))
        }
        other => Ok(CorpusNode::Opaque(OpaqueCorpus {
            type_name: other.to_string(),
            raw: obj.clone(),
        })),
    }
}

/// Serialise a corpus tree to JSON.
pub fn corpus_to_json(node: &CorpusNode) -> Value {
    match node {
        CorpusNode::Field(field) => {
            let mut obj = Map::new();
            let type_name = match field.tag {
                CorpusTag::Doc => "koral:doc",
                CorpusTag::Field => "koral:field",
            };
            obj.insert("@type".into(), type_name.into());
            obj.insert("key".into(), Value::String(field.key.to_string()));
            if !field.value.is_null() {
                obj.insert("value".into(), field.value.clone());
            }
            if let Some(m) = field.match_op {
                obj.insert("match".into(), m.as_koral().into());
            }
            if let Some(t) = field.value_type {
                obj.insert("type".into(), t.as_koral().into());
            }
            if let Some(rewrites) = rewrites_to_json(&field.rewrites) {
                obj.insert("rewrites".into(), rewrites);
            }
            Value::Object(obj)
        }
        CorpusNode::Group(group) => {
            let mut obj = Map::new();
            let type_name = match group.tag {
                CorpusTag::Doc => "koral:docGroup",
                CorpusTag::Field => "koral:fieldGroup",
            };
            obj.insert("@type".into(), type_name.into());
            obj.insert("operation".into(), group.operation.as_koral().into());
            obj.insert(
                "operands".into(),
                Value::Array(group.operands.iter().map(corpus_to_json).collect()),
            );
            if let Some(rewrites) = rewrites_to_json(&group.rewrites) {
                obj.insert("rewrites".into(), rewrites);
            }
            Value::Object(obj)
        }
        CorpusNode::Opaque(opaque) => Value::Object(opaque.raw.clone()),
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

fn as_object(value: &Value) -> Result<&Map<String, Value>, KoralError> {
    value.as_object().ok_or(KoralError::NotAnObject {
        found: json_kind(value),
    })
}

fn node_type(obj: &Map<String, Value>) -> Result<&str, KoralError> {
    obj.get("@type")
        .and_then(Value::as_str)
        .ok_or(KoralError::MissingType)
}

fn text_field(obj: &Map<String, Value>, key: &str) -> SmolStr {
    obj.get(key)
        .and_then(Value::as_str)
        .map(SmolStr::new)
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
