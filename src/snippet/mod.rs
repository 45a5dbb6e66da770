//! Snippet rewriter.
//!
//! KorAP response snippets are a fixed, well-formed markup shape: nested
//! `<span title="foundry/layer:key[:value]">` elements around a single
//! surface token, e.g.
//!
//! ```text
//! <span title="marmot/m:gender:masc"><span title="tt/p:DET">Der</span></span>
//! ```
//!
//! A small hand-written tokenizer walks that markup and collects, per
//! innermost text run, the `title` annotations of its enclosing spans. A
//! rule matches a token when all its obligatory pattern terms occur among
//! those annotations; the replacement's obligatory terms are then
//! injected as new `<span title="…" class="notinindex">` elements wrapped
//! around the token text.
//!
//! Inputs outside the expected shape (foreign tags, unbalanced nesting,
//! text mixed with sibling elements) make the tokenizer bail; the
//! snippet is then returned unchanged.

use smol_str::SmolStr;
use thiserror::Error;
use tracing::warn;

use crate::koral::{QueryNode, Relation, Term};
use crate::matcher::annotation::term_matches;

/// Tokenizer failures; all of them leave the snippet untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
enum SnippetError {
    #[error("tag is never closed")]
    UnclosedTag,
    #[error("unsupported tag '<{0}>'")]
    UnsupportedTag(String),
    #[error("closing tag without opener")]
    Unbalanced,
    #[error("text mixed with sibling elements")]
    MixedText,
}

/// One innermost text run and the annotations of its enclosing spans.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenSpan {
    /// `title` values, outermost first.
    annotations: Vec<String>,
    /// Byte range of the token surface, whitespace trimmed.
    start: usize,
    end: usize,
}

/// Rewrite a snippet with prepared (pattern, replacement) rule pairs.
/// Rules apply in declaration order; every matching rule contributes its
/// annotations to the token it matched.
pub fn rewrite_snippet(snippet: &str, rules: &[(QueryNode, QueryNode)]) -> String {
    let spans = match scan(snippet) {
        Ok(spans) => spans,
        Err(err) => {
            warn!(%err, "snippet left unchanged");
            return snippet.to_string();
        }
    };

    let mut out = String::with_capacity(snippet.len());
    let mut cursor = 0;
    for span in &spans {
        let annotations: Vec<Term> = span
            .annotations
            .iter()
            .filter_map(|a| parse_annotation(a))
            .collect();

        let mut injected = Vec::new();
        for (pattern, replacement) in rules {
            if pattern_present(pattern, &annotations) {
                let mut terms = Vec::new();
                obligatory_terms(replacement, &mut terms);
                injected.extend(terms.iter().map(|t| render_annotation(t)));
            }
        }
        if injected.is_empty() {
            continue;
        }

        out.push_str(&snippet[cursor..span.start]);
        for annotation in &injected {
            out.push_str("<span title=\"");
            out.push_str(annotation);
            out.push_str("\" class=\"notinindex\">");
        }
        out.push_str(&snippet[span.start..span.end]);
        for _ in &injected {
            out.push_str("</span>");
        }
        cursor = span.end;
    }
    out.push_str(&snippet[cursor..]);
    out
}

/// Apply call-time overrides to a snippet replacement subtree: the
/// foundry override covers every term, the layer override only terms
/// whose layer was implicit in the rule.
pub fn apply_replacement_overrides(node: &mut QueryNode, foundry: &str, layer: &str) {
    if foundry.is_empty() && layer.is_empty() {
        return;
    }
    node.walk_terms_mut(&mut |term| {
        if !foundry.is_empty() {
            term.foundry = foundry.into();
        }
        if !layer.is_empty() && term.implicit_layer {
            term.layer = layer.into();
        }
    });
}

// =============================================================================
// Tokenizer
// =============================================================================

struct Frame {
    title: Option<String>,
    text_runs: u32,
    children: u32,
}

fn scan(snippet: &str) -> Result<Vec<TokenSpan>, SnippetError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut spans = Vec::new();
    let mut pos = 0;

    while pos < snippet.len() {
        if snippet[pos..].starts_with('<') {
            let close = snippet[pos..].find('>').ok_or(SnippetError::UnclosedTag)?;
            let tag = &snippet[pos + 1..pos + close];
            pos += close + 1;

            if let Some(name) = tag.strip_prefix('/') {
                if name.trim() != "span" {
                    return Err(SnippetError::UnsupportedTag(tag.to_string()));
                }
                stack.pop().ok_or(SnippetError::Unbalanced)?;
            } else if tag.ends_with('/') {
                // Void element; counts as a child but opens nothing.
                if tag_name(tag) != "br" {
                    return Err(SnippetError::UnsupportedTag(tag.to_string()));
                }
                note_child(&mut stack)?;
            } else {
                if tag_name(tag) != "span" {
                    return Err(SnippetError::UnsupportedTag(tag.to_string()));
                }
                note_child(&mut stack)?;
                stack.push(Frame {
                    title: title_attr(tag),
                    text_runs: 0,
                    children: 0,
                });
            }
        } else {
            let next = snippet[pos..]
                .find('<')
                .map(|i| pos + i)
                .unwrap_or(snippet.len());
            let run = &snippet[pos..next];
            if !run.trim().is_empty() {
                if let Some(frame) = stack.last_mut() {
                    if frame.children > 0 || frame.text_runs > 0 {
                        return Err(SnippetError::MixedText);
                    }
                    frame.text_runs += 1;

                    let lead = run.len() - run.trim_start().len();
                    let trail = run.len() - run.trim_end().len();
                    spans.push(TokenSpan {
                        annotations: stack.iter().filter_map(|f| f.title.clone()).collect(),
                        start: pos + lead,
                        end: next - trail,
                    });
                }
                // Text outside any span is surrounding context, not a token.
            }
            pos = next;
        }
    }

    if !stack.is_empty() {
        return Err(SnippetError::Unbalanced);
    }
    Ok(spans)
}

fn note_child(stack: &mut [Frame]) -> Result<(), SnippetError> {
    if let Some(frame) = stack.last_mut() {
        if frame.text_runs > 0 {
            return Err(SnippetError::MixedText);
        }
        frame.children += 1;
    }
    Ok(())
}

fn tag_name(tag: &str) -> &str {
    tag.split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
}

fn title_attr(tag: &str) -> Option<String> {
    let rest = tag.split_once("title=\"")?.1;
    Some(rest.split_once('"')?.0.to_string())
}

// =============================================================================
// Annotation strings
// =============================================================================

/// Parse `foundry/layer:key[:value]` into a term.
fn parse_annotation(annotation: &str) -> Option<Term> {
    let (foundry, rest) = annotation.split_once('/')?;
    let mut parts = rest.splitn(3, ':');
    let layer = parts.next()?;
    let key = parts.next()?;
    if key.is_empty() {
        return None;
    }
    Some(Term {
        foundry: SmolStr::new(foundry),
        layer: SmolStr::new(layer),
        key: SmolStr::new(key),
        value: SmolStr::new(parts.next().unwrap_or("")),
        ..Term::default()
    })
}

fn render_annotation(term: &Term) -> String {
    let mut out = format!("{}/{}:{}", term.foundry, term.layer, term.key);
    if !term.value.is_empty() {
        out.push(':');
        out.push_str(&term.value);
    }
    out
}

/// True when the pattern's constraints are satisfiable from the token's
/// annotation set: a term must occur among the annotations, AND groups
/// need all operands, OR groups any one.
fn pattern_present(pattern: &QueryNode, annotations: &[Term]) -> bool {
    match pattern {
        QueryNode::Term(term) => annotations.iter().any(|a| term_matches(term, a)),
        QueryNode::TermGroup(group) => match group.relation {
            Relation::And => group
                .operands
                .iter()
                .all(|op| pattern_present(op, annotations)),
            Relation::Or => group
                .operands
                .iter()
                .any(|op| pattern_present(op, annotations)),
        },
        QueryNode::Token(token) => pattern_present(&token.wrap, annotations),
        QueryNode::Catchall(_) => false,
    }
}

/// The obligatory projection of a replacement: OR subtrees are optional
/// and dropped, AND subtrees contribute all their terms, singleton
/// groups collapse into their only operand.
fn obligatory_terms<'a>(node: &'a QueryNode, out: &mut Vec<&'a Term>) {
    match node {
        QueryNode::Term(term) => out.push(term),
        QueryNode::TermGroup(group) if group.operands.len() == 1 => {
            obligatory_terms(&group.operands[0], out);
        }
        QueryNode::TermGroup(group) if group.relation == Relation::And => {
            for op in &group.operands {
                obligatory_terms(op, out);
            }
        }
        QueryNode::TermGroup(_) => {}
        QueryNode::Token(token) => obligatory_terms(&token.wrap, out),
        QueryNode::Catchall(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::koral::TermGroup;

    fn term(foundry: &str, layer: &str, key: &str, value: &str) -> Term {
        Term {
            foundry: SmolStr::new(foundry),
            layer: SmolStr::new(layer),
            key: SmolStr::new(key),
            value: SmolStr::new(value),
            ..Term::default()
        }
    }

    fn and(operands: Vec<QueryNode>) -> QueryNode {
        QueryNode::TermGroup(TermGroup::new(Relation::And, operands))
    }

    #[test]
    fn scan_collects_nested_annotations() {
        let spans =
            scan(r#"<span title="a/b:c"><span title="d/e:f">Der</span></span>"#).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].annotations, ["a/b:c", "d/e:f"]);
    }

    #[test]
    fn scan_ignores_untitled_spans_and_outer_text() {
        let spans = scan(r#"ctx <span class="match">Der</span> ctx"#).unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].annotations.is_empty());
    }

    #[test]
    fn scan_trims_token_whitespace() {
        let snippet = r#"<span title="a/b:c">Der </span>"#;
        let spans = scan(snippet).unwrap();
        assert_eq!(&snippet[spans[0].start..spans[0].end], "Der");
    }

    #[test]
    fn scan_rejects_mixed_sibling_text() {
        assert_eq!(
            scan(r#"<span>Der<span title="a/b:c">Mann</span></span>"#),
            Err(SnippetError::MixedText)
        );
    }

    #[test]
    fn scan_rejects_foreign_tags() {
        assert!(matches!(
            scan("<div>Der</div>"),
            Err(SnippetError::UnsupportedTag(_))
        ));
    }

    #[test]
    fn annotation_strings_round_trip() {
        let t = parse_annotation("marmot/m:gender:masc").unwrap();
        assert_eq!(t.foundry, "marmot");
        assert_eq!(t.layer, "m");
        assert_eq!(t.key, "gender");
        assert_eq!(t.value, "masc");
        assert_eq!(render_annotation(&t), "marmot/m:gender:masc");
    }

    #[test]
    fn injects_replacement_annotations() {
        let snippet = r#"<span title="marmot/m:gender:masc">Der</span>"#;
        let pattern = QueryNode::Term(term("marmot", "m", "gender", "masc"));
        let replacement = and(vec![
            QueryNode::Term(term("opennlp", "p", "M", "")),
            QueryNode::Term(term("opennlp", "m", "M", "")),
        ]);
        let out = rewrite_snippet(snippet, &[(pattern, replacement)]);
        assert_eq!(
            out,
            concat!(
                r#"<span title="marmot/m:gender:masc">"#,
                r#"<span title="opennlp/p:M" class="notinindex">"#,
                r#"<span title="opennlp/m:M" class="notinindex">Der</span></span></span>"#
            )
        );
    }

    #[test]
    fn or_replacements_are_not_injected() {
        let snippet = r#"<span title="a/b:c">Der</span>"#;
        let pattern = QueryNode::Term(term("a", "b", "c", ""));
        let replacement = QueryNode::TermGroup(TermGroup::new(
            Relation::Or,
            vec![
                QueryNode::Term(term("x", "y", "one", "")),
                QueryNode::Term(term("x", "y", "two", "")),
            ],
        ));
        assert_eq!(rewrite_snippet(snippet, &[(pattern, replacement)]), snippet);
    }

    #[test]
    fn and_pattern_requires_all_annotations() {
        let snippet = r#"<span title="a/b:c">Der</span>"#;
        let pattern = and(vec![
            QueryNode::Term(term("a", "b", "c", "")),
            QueryNode::Term(term("a", "b", "missing", "")),
        ]);
        let replacement = QueryNode::Term(term("x", "y", "z", ""));
        assert_eq!(rewrite_snippet(snippet, &[(pattern, replacement)]), snippet);
    }

    #[test]
    fn and_pattern_matches_across_nesting_levels() {
        let snippet = concat!(
            r#"<span title="marmot/m:gender:masc">"#,
            r#"<span title="tt/p:DET">Der</span></span>"#
        );
        let pattern = and(vec![
            QueryNode::Term(term("marmot", "m", "gender", "masc")),
            QueryNode::Term(term("tt", "p", "DET", "")),
        ]);
        let replacement = QueryNode::Term(term("upos", "p", "DET", ""));
        let out = rewrite_snippet(snippet, &[(pattern, replacement)]);
        assert!(out.contains(r#"<span title="upos/p:DET" class="notinindex">Der</span>"#));
    }

    #[test]
    fn or_pattern_needs_only_one_annotation() {
        let snippet = r#"<span title="tt/p:DET">Der</span>"#;
        let pattern = QueryNode::TermGroup(TermGroup::new(
            Relation::Or,
            vec![
                QueryNode::Term(term("tt", "p", "DET", "")),
                QueryNode::Term(term("tt", "p", "PRON", "")),
            ],
        ));
        let replacement = QueryNode::Term(term("upos", "p", "D", ""));
        let out = rewrite_snippet(snippet, &[(pattern, replacement)]);
        assert!(out.contains("notinindex"));
    }

    #[test]
    fn singleton_or_replacement_is_obligatory() {
        let mut terms = Vec::new();
        let replacement = QueryNode::TermGroup(TermGroup::new(
            Relation::Or,
            vec![QueryNode::Term(term("a", "b", "only", ""))],
        ));
        obligatory_terms(&replacement, &mut terms);
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].key, "only");
    }

    #[test]
    fn void_br_tags_are_tolerated() {
        let spans = scan(r#"<span title="a/b:c">Der</span><br/>"#).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn malformed_snippets_pass_through() {
        let snippet = "<span>Der";
        assert_eq!(rewrite_snippet(snippet, &[]), snippet);
    }

    #[test]
    fn selective_layer_override() {
        let mut replacement = and(vec![
            QueryNode::Term(Term {
                implicit_layer: true,
                ..term("", "p", "M", "")
            }),
            QueryNode::Term(term("", "m", "M", "")),
        ]);
        apply_replacement_overrides(&mut replacement, "custom", "x");
        let group = replacement.as_term_group().unwrap();
        let first = group.operands[0].as_term().unwrap();
        assert_eq!((first.foundry.as_str(), first.layer.as_str()), ("custom", "x"));
        let second = group.operands[1].as_term().unwrap();
        assert_eq!((second.foundry.as_str(), second.layer.as_str()), ("custom", "m"));
    }
}
