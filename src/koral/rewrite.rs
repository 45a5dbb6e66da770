//! Rewrite audit records.
//!
//! A `koral:rewrite` entry documents that a node was changed, by whom, and
//! what it looked like before. Older KorAP components used `src` for the
//! source field and `_comment` for the comment; both are accepted on input
//! and re-normalised on output.

use serde_json::{Map, Value};
use smol_str::SmolStr;

/// The editor name this service writes into rewrite entries.
pub const EDITOR: &str = "Koral-Mapper";

/// A `koral:rewrite` audit record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rewrite {
    pub editor: SmolStr,
    pub operation: SmolStr,
    pub scope: SmolStr,
    pub source: SmolStr,
    pub comment: SmolStr,
    /// What the rewritten node (or field) looked like before.
    pub original: Option<Value>,
}

impl Rewrite {
    /// A rewrite entry as this service emits it.
    pub fn injection(original: Value) -> Self {
        Self {
            editor: SmolStr::new(EDITOR),
            operation: SmolStr::new("operation:override"),
            original: Some(original),
            ..Self::default()
        }
    }

    /// A rewrite entry scoped to a single changed field.
    pub fn field_override(scope: &str, original: Value) -> Self {
        Self {
            scope: SmolStr::new(scope),
            ..Self::injection(original)
        }
    }

    /// Read a rewrite entry from its JSON object form.
    pub fn from_json(obj: &Map<String, Value>) -> Self {
        let text = |keys: &[&str]| -> SmolStr {
            keys.iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(SmolStr::new)
                .unwrap_or_default()
        };
        Self {
            editor: text(&["editor"]),
            operation: text(&["operation"]),
            scope: text(&["scope"]),
            source: text(&["src", "source"]),
            comment: text(&["comment", "_comment"]),
            original: obj.get("original").cloned(),
        }
    }

    /// Serialise to the normalised JSON object form.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("@type".into(), Value::String("koral:rewrite".into()));
        for (name, field) in [
            ("editor", &self.editor),
            ("operation", &self.operation),
            ("scope", &self.scope),
            ("src", &self.source),
            ("comment", &self.comment),
        ] {
            if !field.is_empty() {
                obj.insert(name.into(), Value::String(field.to_string()));
            }
        }
        if let Some(original) = &self.original {
            obj.insert("original".into(), original.clone());
        }
        Value::Object(obj)
    }
}

/// Read a `rewrites` array, tolerating entries that are not objects.
pub fn rewrites_from_json(value: Option<&Value>) -> Vec<Rewrite> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_object)
        .map(Rewrite::from_json)
        .collect()
}

/// Serialise a `rewrites` array, or `None` when there is nothing to write.
pub fn rewrites_to_json(rewrites: &[Rewrite]) -> Option<Value> {
    if rewrites.is_empty() {
        return None;
    }
    Some(Value::Array(rewrites.iter().map(Rewrite::to_json).collect()))
}
