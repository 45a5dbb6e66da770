//! Structural pattern matcher and replacement engine for the annotation
//! dialect.
//!
//! A rule's pattern side is matched against a query tree under these
//! rules:
//!
//! - a `Term` pattern matches a `Term` node when every *specified* field
//!   agrees; empty pattern fields match anything;
//! - a `TermGroup` pattern matches a `TermGroup` node with the same
//!   relation whose operands pair up one-to-one as a commutative set
//!   (greedy first-fit, exact count);
//! - a `Token` is never matched directly, the matcher descends into its
//!   `wrap`.
//!
//! On a match the subtree is replaced by a clone of the replacement side;
//! each rule replaces at most one subtree per transform, found in
//! pre-order, and the new subtree is not re-matched.

use serde_json::Value;
use tracing::debug;

use crate::koral::{query_to_json, QueryNode, Rewrite, Term, TermMatch};

/// True when the pattern term's constraints all hold on the node term.
pub fn term_matches(pattern: &Term, node: &Term) -> bool {
    (pattern.foundry.is_empty() || pattern.foundry == node.foundry)
        && (pattern.layer.is_empty() || pattern.layer == node.layer)
        && (pattern.key.is_empty() || pattern.key == node.key)
        && (pattern.value.is_empty() || pattern.value == node.value)
        && match pattern.match_op {
            None => true,
            Some(m) => node.match_op.unwrap_or(TermMatch::Eq) == m,
        }
}

/// Structural match of a pattern subtree against a node subtree.
pub fn node_matches(pattern: &QueryNode, node: &QueryNode) -> bool {
    match (pattern, node) {
        (QueryNode::Term(p), QueryNode::Term(n)) => term_matches(p, n),
        (QueryNode::TermGroup(p), QueryNode::TermGroup(n)) => {
            p.relation == n.relation
                && p.operands.len() == n.operands.len()
                && pair_operands(&p.operands, &n.operands)
        }
        _ => false,
    }
}

/// Commutative pairing: each pattern operand claims the first unclaimed
/// node operand it matches. Order of either side is irrelevant.
fn pair_operands(patterns: &[QueryNode], nodes: &[QueryNode]) -> bool {
    let mut claimed = vec![false; nodes.len()];
    'patterns: for pattern in patterns {
        for (i, node) in nodes.iter().enumerate() {
            if !claimed[i] && node_matches(pattern, node) {
                claimed[i] = true;
                continue 'patterns;
            }
        }
        return false;
    }
    true
}

/// Overwrite the foundry/layer of every term with call-time overrides.
/// Empty override values leave the terms alone.
pub fn apply_overrides(node: &mut QueryNode, foundry: &str, layer: &str) {
    if foundry.is_empty() && layer.is_empty() {
        return;
    }
    node.walk_terms_mut(&mut |term| {
        if !foundry.is_empty() {
            term.foundry = foundry.into();
        }
        if !layer.is_empty() {
            term.layer = layer.into();
        }
    });
}

/// Apply one prepared rule to the tree: replace the first subtree that
/// matches the pattern, in pre-order. Returns whether a replacement
/// happened.
pub fn apply_rule(
    node: &mut QueryNode,
    pattern: &QueryNode,
    replacement: &QueryNode,
    add_rewrites: bool,
) -> bool {
    if node_matches(pattern, node) {
        replace(node, replacement, add_rewrites);
        return true;
    }
    match node {
        QueryNode::Token(token) => apply_rule(&mut token.wrap, pattern, replacement, add_rewrites),
        QueryNode::TermGroup(group) => group
            .operands
            .iter_mut()
            .any(|op| apply_rule(op, pattern, replacement, add_rewrites)),
        QueryNode::Catchall(catchall) => {
            if let Some(wrap) = &mut catchall.wrap {
                if apply_rule(wrap, pattern, replacement, add_rewrites) {
                    return true;
                }
            }
            catchall
                .operands
                .iter_mut()
                .flatten()
                .any(|op| apply_rule(op, pattern, replacement, add_rewrites))
        }
        QueryNode::Term(_) => false,
    }
}

fn replace(node: &mut QueryNode, replacement: &QueryNode, add_rewrites: bool) {
    let original = std::mem::replace(node, replacement.clone());
    debug!(from = original.type_name(), to = node.type_name(), "replaced subtree");
    if add_rewrites {
        attach_rewrite(node, &original);
    }
}

fn attach_rewrite(node: &mut QueryNode, original: &QueryNode) {
    let rewrite = match (original, &*node) {
        (QueryNode::Term(old), QueryNode::Term(new)) => match single_field_delta(old, new) {
            Some((field, old_value)) => {
                Rewrite::field_override(field, Value::String(old_value.to_string()))
            }
            None => Rewrite::injection(query_to_json(original)),
        },
        _ => Rewrite::injection(query_to_json(original)),
    };
    match node {
        QueryNode::Term(t) => t.rewrites.push(rewrite),
        QueryNode::TermGroup(g) => g.rewrites.push(rewrite),
        QueryNode::Token(t) => t.rewrites.push(rewrite),
        QueryNode::Catchall(_) => {}
    }
}

/// When exactly one of foundry/layer/key/value differs between the two
/// terms, return its name and the old value. Fields are inspected in the
/// fixed order foundry, layer, key, value.
fn single_field_delta<'a>(old: &'a Term, new: &Term) -> Option<(&'static str, &'a str)> {
    let mut delta = None;
    for (name, old_value, new_value) in [
        ("foundry", &old.foundry, &new.foundry),
        ("layer", &old.layer, &new.layer),
        ("key", &old.key, &new.key),
        ("value", &old.value, &new.value),
    ] {
        if old_value != new_value {
            if delta.is_some() {
                return None;
            }
            delta = Some((name, old_value.as_str()));
        }
    }
    delta
}
