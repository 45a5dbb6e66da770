//! Structural pattern matcher and replacement engine for the corpus
//! dialect.
//!
//! Matching differs from the annotation dialect in three ways: an AND
//! pattern group matches a node group as a commutative *subset* (the node
//! may carry extra operands, which survive the replacement), an OR pattern
//! group matches a single field when *any* of its operands does, and OR/OR
//! group matching requires an exact operand count. Rules apply
//! iteratively: each rule sees the tree as left by its predecessors.
//!
//! `koral:docGroupRef` and other opaque nodes are never matched and never
//! descended into.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::koral::{
    corpus_to_json, CorpusField, CorpusMatch, CorpusNode, CorpusTag, FieldValueType, GroupOp,
    Rewrite,
};

/// True when the pattern field's constraints all hold on the node field.
pub fn field_matches(pattern: &CorpusField, node: &CorpusField) -> bool {
    if pattern.key != node.key {
        return false;
    }

    let pattern_value = pattern.value_text();
    let node_value = node.value_text();
    let value_ok = if pattern.value_type == Some(FieldValueType::Regex) {
        match anchored_regex(&pattern_value) {
            Ok(re) => re.is_match(&node_value),
            Err(err) => {
                warn!(pattern = %pattern_value, %err, "skipping rule with invalid regex");
                return false;
            }
        }
    } else {
        pattern_value == node_value
    };
    if !value_ok {
        return false;
    }

    if let Some(m) = pattern.match_op {
        if node.match_op.unwrap_or(CorpusMatch::Eq) != m {
            return false;
        }
    }
    // A non-regex pattern type constrains the node type only when the node
    // declares one.
    if let Some(t) = pattern.value_type {
        if t != FieldValueType::Regex {
            if let Some(node_type) = node.value_type {
                if node_type != t {
                    return false;
                }
            }
        }
    }
    true
}

fn anchored_regex(pattern: &str) -> Result<regex::Regex, regex::Error> {
    regex::Regex::new(&format!("^(?:{pattern})$"))
}

/// Structural match of a corpus pattern against a corpus node.
pub fn node_matches(pattern: &CorpusNode, node: &CorpusNode) -> bool {
    match (pattern, node) {
        (CorpusNode::Field(p), CorpusNode::Field(n)) => field_matches(p, n),
        (CorpusNode::Group(p), CorpusNode::Group(n)) => match (p.operation, n.operation) {
            (GroupOp::And, GroupOp::And) => subset_pairing(&p.operands, &n.operands).is_some(),
            (GroupOp::Or, GroupOp::Or) => {
                p.operands.len() == n.operands.len()
                    && subset_pairing(&p.operands, &n.operands).is_some()
            }
            _ => false,
        },
        // An OR pattern matches a lone field when any operand does.
        (CorpusNode::Group(p), CorpusNode::Field(_)) if p.operation == GroupOp::Or => {
            p.operands.iter().any(|op| node_matches(op, node))
        }
        _ => false,
    }
}

/// Commutative first-fit pairing of pattern operands onto node operands.
/// Returns the claimed node indices (in claim order), or `None` when some
/// pattern operand finds no partner. Extra node operands are allowed.
fn subset_pairing(patterns: &[CorpusNode], nodes: &[CorpusNode]) -> Option<Vec<usize>> {
    let mut claimed = vec![false; nodes.len()];
    let mut indices = Vec::with_capacity(patterns.len());
    'patterns: for pattern in patterns {
        for (i, node) in nodes.iter().enumerate() {
            if !claimed[i] && node_matches(pattern, node) {
                claimed[i] = true;
                indices.push(i);
                continue 'patterns;
            }
        }
        return None;
    }
    Some(indices)
}

/// Overwrite the key of every field in a rule subtree with a call-time
/// field override.
pub fn apply_field_override(node: &mut CorpusNode, key: &str) {
    if key.is_empty() {
        return;
    }
    node.walk_fields_mut(&mut |field| field.key = key.into());
}

/// Apply prepared rules in declaration order. Each rule rewrites the first
/// matching subtree, searched in pre-order, of the tree as left by the
/// previous rules.
pub fn apply_rules(root: &mut CorpusNode, rules: &[(CorpusNode, CorpusNode)], add_rewrites: bool) {
    for (pattern, replacement) in rules {
        apply_rule(root, pattern, replacement, add_rewrites);
    }
}

/// Apply one rule; returns whether a replacement happened.
pub fn apply_rule(
    node: &mut CorpusNode,
    pattern: &CorpusNode,
    replacement: &CorpusNode,
    add_rewrites: bool,
) -> bool {
    if replace_at(node, pattern, replacement, add_rewrites) {
        return true;
    }
    if let CorpusNode::Group(group) = node {
        return group
            .operands
            .iter_mut()
            .any(|op| apply_rule(op, pattern, replacement, add_rewrites));
    }
    false
}

fn replace_at(
    node: &mut CorpusNode,
    pattern: &CorpusNode,
    replacement: &CorpusNode,
    add_rewrites: bool,
) -> bool {
    // AND/AND subset matching keeps unmatched extras next to the
    // replacement, so it gets its own path.
    if let (CorpusNode::Group(p), CorpusNode::Group(n)) = (pattern, &*node) {
        if p.operation == GroupOp::And && n.operation == GroupOp::And {
            let Some(matched) = subset_pairing(&p.operands, &n.operands) else {
                return false;
            };
            if matched.len() < n.operands.len() {
                replace_subset(node, matched, replacement, add_rewrites);
                return true;
            }
            replace_whole(node, replacement, add_rewrites);
            return true;
        }
    }

    if node_matches(pattern, node) {
        replace_whole(node, replacement, add_rewrites);
        return true;
    }
    false
}

/// Replace only the matched operands of an AND group, preserving extras.
/// A group left with a single operand collapses to that operand.
fn replace_subset(
    node: &mut CorpusNode,
    mut matched: Vec<usize>,
    replacement: &CorpusNode,
    add_rewrites: bool,
) {
    let original = add_rewrites.then(|| corpus_to_json(node));

    let CorpusNode::Group(group) = node else {
        unreachable!("subset replacement only applies to groups");
    };
    matched.sort_unstable();
    let insert_at = matched[0];
    for &i in matched.iter().rev() {
        group.operands.remove(i);
    }
    group.operands.insert(insert_at, replacement.clone());
    if group.operands.len() == 1 {
        let only = group.operands.pop().expect("one operand");
        *node = only;
    }

    if let Some(original) = original {
        attach_rewrite(node, Rewrite::injection(original));
    }
    debug!("replaced subset of AND group");
}

fn replace_whole(node: &mut CorpusNode, replacement: &CorpusNode, add_rewrites: bool) {
    let original = std::mem::replace(node, replacement.clone());

    let rewrite = match (&original, &mut *node) {
        // A leaf replacement keeps the original's wire spelling and,
        // unless the rule overrides them, its match operation and type.
        (CorpusNode::Field(old), CorpusNode::Field(new)) => {
            new.tag = old.tag;
            if new.match_op.is_none() {
                new.match_op = old.match_op;
            }
            if new.value_type.is_none() {
                new.value_type = old.value_type;
            }
            if !add_rewrites {
                None
            } else if let Some((scope, old_value)) = leaf_delta(old, new) {
                Some(Rewrite::field_override(scope, old_value))
            } else {
                Some(Rewrite::injection(corpus_to_json(&original)))
            }
        }
        // Group-shaped replacements adopt the original root's spelling.
        (_, CorpusNode::Group(new)) => {
            new.tag = match &original {
                CorpusNode::Field(f) => f.tag,
                CorpusNode::Group(g) => g.tag,
                CorpusNode::Opaque(_) => CorpusTag::Doc,
            };
            add_rewrites.then(|| Rewrite::injection(corpus_to_json(&original)))
        }
        _ => add_rewrites.then(|| Rewrite::injection(corpus_to_json(&original))),
    };

    if let Some(rewrite) = rewrite {
        attach_rewrite(node, rewrite);
    }
}

/// The changed key or value of a leaf replacement, when only one of the
/// two changed.
fn leaf_delta(old: &CorpusField, new: &CorpusField) -> Option<(&'static str, Value)> {
    let key_changed = old.key != new.key;
    let value_changed = old.value_text() != new.value_text();
    match (key_changed, value_changed) {
        (true, false) => Some(("key", Value::String(old.key.to_string()))),
        (false, true) => Some(("value", old.value.clone())),
        _ => None,
    }
}

fn attach_rewrite(node: &mut CorpusNode, rewrite: Rewrite) {
    match node {
        CorpusNode::Field(f) => f.rewrites.push(rewrite),
        CorpusNode::Group(g) => g.rewrites.push(rewrite),
        CorpusNode::Opaque(_) => {}
    }
}

// =============================================================================
// Response enrichment
// =============================================================================

/// Enrich a response `fields` array: every entry that matches a rule
/// pattern gains the flattened replacement fields, appended right after
/// it and flagged `mapped`. Original entries are never removed.
///
/// AND pattern groups cannot match one flat field and never fire here; OR
/// replacement groups are dropped because flat key/value entries cannot
/// express "one of".
pub fn map_response_fields(fields: &mut Vec<Value>, rules: &[(CorpusNode, CorpusNode)]) {
    let mut i = 0;
    while i < fields.len() {
        let mapped = mapped_entries_for(&fields[i], rules);
        let added = mapped.len();
        for (offset, entry) in mapped.into_iter().enumerate() {
            fields.insert(i + 1 + offset, entry);
        }
        i += 1 + added;
    }
}

fn mapped_entries_for(entry: &Value, rules: &[(CorpusNode, CorpusNode)]) -> Vec<Value> {
    let Some(obj) = entry.as_object() else {
        return Vec::new();
    };
    let Some(key) = obj.get("key").and_then(Value::as_str) else {
        return Vec::new();
    };
    // Multi-value fields expand: each element is matched on its own.
    let values: Vec<&Value> = match obj.get("value") {
        Some(Value::Array(elements)) => elements.iter().collect(),
        Some(value) => vec![value],
        None => return Vec::new(),
    };

    let mut out = Vec::new();
    for value in values {
        let pseudo = CorpusNode::Field(CorpusField {
            tag: CorpusTag::Field,
            key: key.into(),
            value: value.clone(),
            match_op: None,
            value_type: None,
            rewrites: Vec::new(),
        });
        for (pattern, replacement) in rules {
            if node_matches(pattern, &pseudo) {
                flatten_replacement(replacement, &mut out);
            }
        }
    }
    out
}

/// Flatten a replacement subtree into `mapped` field entries. AND groups
/// contribute all their fields, singleton groups collapse, and OR groups
/// with several alternatives are dropped.
fn flatten_replacement(replacement: &CorpusNode, out: &mut Vec<Value>) {
    match replacement {
        CorpusNode::Field(field) => out.push(json!({
            "@type": "koral:field",
            "key": field.key.as_str(),
            "value": field.value,
            "mapped": true,
        })),
        CorpusNode::Group(group) if group.operands.len() == 1 => {
            flatten_replacement(&group.operands[0], out);
        }
        CorpusNode::Group(group) if group.operation == GroupOp::And => {
            for op in &group.operands {
                flatten_replacement(op, out);
            }
        }
        CorpusNode::Group(_) => {
            debug!("dropping OR replacement; flat fields cannot express disjunction");
        }
        CorpusNode::Opaque(_) => {}
    }
}
