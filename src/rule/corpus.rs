//! Scanner for the corpus rule dialect.
//!
//! Grammar, per side:
//!
//! ```text
//! side  ::= field | '(' expr ')'
//! expr  ::= operand (('&' operand)* | ('|' operand)*)
//! operand ::= field | '(' expr ')'
//! field ::= [key '='] value [':' match] ['#' type]
//! ```
//!
//! Values are free text up to a structural `&`, `|`, or `)` at nesting
//! depth zero, so regex values with balanced groups (`(a|b)c`) pass
//! through unharmed. The `:match` suffix is only recognised when the tail
//! after the last `:` names a match operation, otherwise the colon belongs
//! to the value; the `#type` suffix works the same way. A value without
//! `key=` takes its key from the list's `fieldA`/`fieldB` default.

use serde_json::Value;
use smol_str::SmolStr;

use crate::koral::{
    CorpusField, CorpusGroup, CorpusMatch, CorpusNode, CorpusTag, FieldValueType, GroupOp,
};

use super::error::RuleParseError;
use super::{CorpusRule, ListDefaults, Side};

/// Parse one corpus rule, filling bare-value keys from the list defaults.
pub fn parse_corpus_rule(
    rule: &str,
    defaults: &ListDefaults,
) -> Result<CorpusRule, RuleParseError> {
    let Some((upper_src, lower_src)) = rule.split_once("<>") else {
        return Err(RuleParseError::syntax(rule, "expected '<>'"));
    };

    let upper = parse_side(rule, upper_src.trim(), side_key(defaults, Side::A))?;
    let lower = parse_side(rule, lower_src.trim(), side_key(defaults, Side::B))?;
    Ok(CorpusRule { upper, lower })
}

fn side_key(defaults: &ListDefaults, side: Side) -> &SmolStr {
    match side {
        Side::A => &defaults.field_a,
        Side::B => &defaults.field_b,
    }
}

fn parse_side(
    rule: &str,
    src: &str,
    default_key: &SmolStr,
) -> Result<CorpusNode, RuleParseError> {
    if src.is_empty() {
        return Err(RuleParseError::syntax(rule, "empty rule side"));
    }
    if let Some(inner) = outer_group(src) {
        return parse_expr(rule, inner, default_key);
    }
    Ok(CorpusNode::Field(parse_field(rule, src, default_key)?))
}

/// When the whole string is one parenthesised group, return its interior.
fn outer_group(src: &str) -> Option<&str> {
    if !src.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in src.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return if i == src.len() - 1 {
                        Some(src[1..i].trim())
                    } else {
                        // The group closes before the string ends, so the
                        // parenthesis belongs to a value.
                        None
                    };
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_expr(
    rule: &str,
    src: &str,
    default_key: &SmolStr,
) -> Result<CorpusNode, RuleParseError> {
    let mut operator: Option<GroupOp> = None;
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in src.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| RuleParseError::syntax(rule, "unbalanced ')'"))?;
            }
            '&' | '|' if depth == 0 => {
                let op = if c == '&' { GroupOp::And } else { GroupOp::Or };
                match operator {
                    None => operator = Some(op),
                    Some(existing) if existing != op => {
                        return Err(RuleParseError::syntax(
                            rule,
                            "mixed '&' and '|' require parentheses",
                        ));
                    }
                    Some(_) => {}
                }
                pieces.push(&src[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(RuleParseError::syntax(rule, "unbalanced '('"));
    }
    pieces.push(&src[start..]);

    let mut operands = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let piece = piece.trim();
        if piece.is_empty() {
            return Err(RuleParseError::syntax(rule, "empty group operand"));
        }
        operands.push(match outer_group(piece) {
            Some(inner) => parse_expr(rule, inner, default_key)?,
            None => CorpusNode::Field(parse_field(rule, piece, default_key)?),
        });
    }

    match operator {
        None => Ok(operands.pop().expect("at least one operand")),
        Some(operation) => Ok(CorpusNode::Group(CorpusGroup::new(operation, operands))),
    }
}

fn parse_field(
    rule: &str,
    src: &str,
    default_key: &SmolStr,
) -> Result<CorpusField, RuleParseError> {
    let mut rest = src.trim();

    // Suffixes come off back to front: `key=value:match#type`.
    let mut value_type = None;
    if let Some(pos) = rest.rfind('#') {
        if let Some(t) = FieldValueType::from_name(rest[pos + 1..].trim()) {
            value_type = Some(t);
            rest = rest[..pos].trim_end();
        }
    }
    let mut match_op = None;
    if let Some(pos) = rest.rfind(':') {
        if let Some(m) = CorpusMatch::from_name(rest[pos + 1..].trim()) {
            match_op = Some(m);
            rest = rest[..pos].trim_end();
        }
    }

    let (key, value) = match rest.split_once('=') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => {
            if default_key.is_empty() {
                return Err(RuleParseError::syntax(
                    rule,
                    "bare value requires a fieldA/fieldB default",
                ));
            }
            (default_key.as_str(), rest)
        }
    };
    if key.is_empty() {
        return Err(RuleParseError::syntax(rule, "empty field key"));
    }
    if value.is_empty() {
        return Err(RuleParseError::syntax(rule, "empty field value"));
    }

    Ok(CorpusField {
        tag: CorpusTag::Doc,
        key: SmolStr::new(key),
        value: Value::String(value.to_string()),
        match_op,
        value_type,
        rewrites: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(rule: &str) -> CorpusRule {
        parse_corpus_rule(rule, &ListDefaults::default()).unwrap()
    }

    fn field(node: &CorpusNode) -> &CorpusField {
        node.as_field().expect("expected a field")
    }

    #[test]
    fn simple_field_pair() {
        let rule = parse("textClass=novel <> genre=fiction");
        let upper = field(&rule.upper);
        assert_eq!(upper.key, "textClass");
        assert_eq!(upper.value, "novel");
        assert_eq!(upper.tag, CorpusTag::Doc);
        assert_eq!(field(&rule.lower).key, "genre");
    }

    #[test]
    fn group_side() {
        let rule = parse("genre=fiction <> (textClass=kultur & textClass=musik)");
        match &rule.lower {
            CorpusNode::Group(group) => {
                assert_eq!(group.operation, GroupOp::And);
                assert_eq!(group.operands.len(), 2);
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn match_and_type_suffixes() {
        let rule = parse("pubDate=2020:geq#date <> era=modern");
        let upper = field(&rule.upper);
        assert_eq!(upper.value, "2020");
        assert_eq!(upper.match_op, Some(CorpusMatch::Geq));
        assert_eq!(upper.value_type, Some(FieldValueType::Date));
    }

    #[test]
    fn colon_without_match_name_stays_in_value() {
        let rule = parse("time=10:30 <> slot=morning");
        let upper = field(&rule.upper);
        assert_eq!(upper.value, "10:30");
        assert_eq!(upper.match_op, None);
    }

    #[test]
    fn regex_value_with_structural_characters() {
        let rule = parse("pos=(APPR|ART)x#regex <> wordClass=adposition");
        let upper = field(&rule.upper);
        assert_eq!(upper.value, "(APPR|ART)x");
        assert_eq!(upper.value_type, Some(FieldValueType::Regex));
    }

    #[test]
    fn bare_values_use_field_defaults() {
        let defaults = ListDefaults {
            field_a: "textClass".into(),
            field_b: "genre".into(),
            ..ListDefaults::default()
        };
        let rule = parse_corpus_rule("novel <> fiction", &defaults).unwrap();
        assert_eq!(field(&rule.upper).key, "textClass");
        assert_eq!(field(&rule.lower).key, "genre");
    }

    #[test]
    fn bare_value_without_default_is_rejected() {
        assert!(parse_corpus_rule("novel <> fiction", &ListDefaults::default()).is_err());
    }

    #[test]
    fn mixed_operators_are_rejected() {
        let err =
            parse_corpus_rule("a=1 <> (b=2 & c=3 | d=4)", &ListDefaults::default()).unwrap_err();
        assert!(matches!(err, RuleParseError::Syntax { .. }));
    }

    #[test]
    fn nested_groups() {
        let rule = parse("a=1 <> ((b=2 & c=3) | (d=4 & e=5))");
        match &rule.lower {
            CorpusNode::Group(group) => {
                assert_eq!(group.operation, GroupOp::Or);
                assert!(matches!(group.operands[0], CorpusNode::Group(_)));
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }
}
