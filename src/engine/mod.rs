//! Mapping engine and cascade driver.
//!
//! The engine owns every mapping list for the process lifetime: rule
//! strings are parsed once at startup and the resulting rule trees are
//! immutable from then on. Per request, the engine clones the relevant
//! rule sides (pattern side picked by direction), applies call-time
//! overrides to the clones, and runs the dialect's matcher over the
//! payload. A cascade is a left fold of such applications: every step
//! sees the previous step's full output.

pub mod cfg;
pub mod error;
pub mod options;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ListKind, MappingListConfig};
use crate::koral::{
    corpus_from_json, corpus_to_json, query_from_json, query_to_json, CorpusNode, QueryNode,
};
use crate::matcher::{annotation, corpus};
use crate::rule::{parse_annotation_rule, parse_corpus_rule, ListDefaults, ListRule};
use crate::snippet;

pub use cfg::{build_cfg, parse_cfg, CascadeStep};
pub use error::MapperError;
pub use options::{Direction, MappingOptions};

/// A mapping list with its rules parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingList {
    pub id: String,
    pub kind: ListKind,
    pub description: String,
    pub defaults: ListDefaults,
    pub rules: Vec<ListRule>,
}

/// The rule registry plus the transform entry points.
#[derive(Debug, Default)]
pub struct MappingEngine {
    lists: IndexMap<String, MappingList>,
}

impl MappingEngine {
    /// Parse every configured list. Fails on the first duplicate ID or
    /// unparseable rule; both are startup configuration errors.
    pub fn from_configs(configs: &[MappingListConfig]) -> Result<Self, ConfigError> {
        let mut lists = IndexMap::with_capacity(configs.len());
        for config in configs {
            if config.id.is_empty() {
                return Err(ConfigError::EmptyId);
            }
            let defaults = config.defaults();
            let mut rules = Vec::with_capacity(config.mappings.len());
            for raw in &config.mappings {
                let rule = match config.kind {
                    ListKind::Annotation => ListRule::Annotation(
                        parse_annotation_rule(raw, &defaults).map_err(|source| {
                            ConfigError::Rule {
                                list: config.id.clone(),
                                source,
                            }
                        })?,
                    ),
                    ListKind::Corpus => {
                        ListRule::Corpus(parse_corpus_rule(raw, &defaults).map_err(|source| {
                            ConfigError::Rule {
                                list: config.id.clone(),
                                source,
                            }
                        })?)
                    }
                };
                rules.push(rule);
            }
            info!(id = %config.id, rules = rules.len(), "loaded mapping list");
            let list = MappingList {
                id: config.id.clone(),
                kind: config.kind,
                description: config.description.clone(),
                defaults,
                rules,
            };
            if lists.insert(config.id.clone(), list).is_some() {
                return Err(ConfigError::DuplicateId(config.id.clone()));
            }
        }
        Ok(Self { lists })
    }

    /// Look up a list, in configuration order.
    pub fn list(&self, id: &str) -> Result<&MappingList, MapperError> {
        self.lists
            .get(id)
            .ok_or_else(|| MapperError::UnknownList(id.to_string()))
    }

    /// All lists, in configuration order.
    pub fn lists(&self) -> impl Iterator<Item = &MappingList> {
        self.lists.values()
    }

    // =========================================================================
    // Query transform
    // =========================================================================

    /// Rewrite a query payload. An annotation list operates on the
    /// `query` subtree, a corpus list on the `corpus`/`collection`
    /// subtree; without such a wrapper the payload itself is taken as the
    /// subtree. Non-object payloads pass through untouched.
    pub fn map_query(
        &self,
        id: &str,
        options: &MappingOptions,
        input: Value,
    ) -> Result<Value, MapperError> {
        let list = self.list(id)?;
        if !input.is_object() {
            debug!("non-object query payload passed through");
            return Ok(input);
        }
        match list.kind {
            ListKind::Annotation => self.map_query_annotation(list, options, input),
            ListKind::Corpus => self.map_query_corpus(list, options, input),
        }
    }

    fn map_query_annotation(
        &self,
        list: &MappingList,
        options: &MappingOptions,
        mut input: Value,
    ) -> Result<Value, MapperError> {
        let rules = prepare_annotation_rules(list, options);
        let obj = input.as_object_mut().expect("object checked by caller");
        let wrapped = obj.get("query").cloned();
        if let Some(query) = wrapped {
            let mut ast = query_from_json(&query)?;
            apply_annotation_rules(&rules, &mut ast, options.add_rewrites);
            obj.insert("query".into(), query_to_json(&ast));
            Ok(input)
        } else {
            let mut ast = query_from_json(&input)?;
            apply_annotation_rules(&rules, &mut ast, options.add_rewrites);
            Ok(query_to_json(&ast))
        }
    }

    fn map_query_corpus(
        &self,
        list: &MappingList,
        options: &MappingOptions,
        mut input: Value,
    ) -> Result<Value, MapperError> {
        let rules = prepare_corpus_rules(list, options);
        let obj = input.as_object_mut().expect("object checked by caller");
        for section in ["corpus", "collection"] {
            let Some(subtree) = obj.get(section).cloned() else {
                continue;
            };
            let mut ast = corpus_from_json(&subtree)?;
            corpus::apply_rules(&mut ast, &rules, options.add_rewrites);
            obj.insert(section.into(), corpus_to_json(&ast));
            return Ok(input);
        }
        // A query envelope without a corpus part leaves a corpus list
        // nothing to do.
        if obj.contains_key("query") {
            debug!("query payload without corpus section passed through");
            return Ok(input);
        }
        let mut ast = corpus_from_json(&input)?;
        corpus::apply_rules(&mut ast, &rules, options.add_rewrites);
        Ok(corpus_to_json(&ast))
    }

    // =========================================================================
    // Response transform
    // =========================================================================

    /// Enrich a response payload: an annotation list rewrites the
    /// `snippet` string, a corpus list appends mapped entries to the
    /// `fields` array. Payloads without those members pass through.
    pub fn map_response(
        &self,
        id: &str,
        options: &MappingOptions,
        mut input: Value,
    ) -> Result<Value, MapperError> {
        let list = self.list(id)?;
        if !input.is_object() {
            debug!("non-object response payload passed through");
            return Ok(input);
        }
        let obj = input.as_object_mut().expect("object checked above");
        match list.kind {
            ListKind::Annotation => {
                let text = obj.get("snippet").and_then(Value::as_str).map(str::to_owned);
                if let Some(text) = text {
                    let rules = prepare_snippet_rules(list, options);
                    let rewritten = snippet::rewrite_snippet(&text, &rules);
                    obj.insert("snippet".into(), Value::String(rewritten));
                }
            }
            ListKind::Corpus => {
                if let Some(Value::Array(fields)) = obj.get_mut("fields") {
                    let rules = prepare_corpus_rules(list, options);
                    corpus::map_response_fields(fields, &rules);
                }
            }
        }
        Ok(input)
    }

    // =========================================================================
    // Cascade
    // =========================================================================

    /// Apply cascade steps to a query payload, in order. The empty
    /// cascade is the identity.
    pub fn map_query_cascade(
        &self,
        steps: &[CascadeStep],
        input: Value,
    ) -> Result<Value, MapperError> {
        steps.iter().try_fold(input, |value, step| {
            self.map_query(&step.id, &step.options, value)
        })
    }

    /// Apply cascade steps to a response payload, in order.
    pub fn map_response_cascade(
        &self,
        steps: &[CascadeStep],
        input: Value,
    ) -> Result<Value, MapperError> {
        steps.iter().try_fold(input, |value, step| {
            self.map_response(&step.id, &step.options, value)
        })
    }
}

// =============================================================================
// Per-request rule preparation
// =============================================================================

// The clones below are this request's working copies: rules themselves
// stay frozen, and each rule is cloned exactly once per transform (the
// snippet rewriter reuses the clones across all token spans).

fn oriented<U: Clone>(upper: &U, lower: &U, direction: Direction) -> (U, U) {
    match direction {
        Direction::AtoB => (upper.clone(), lower.clone()),
        Direction::BtoA => (lower.clone(), upper.clone()),
    }
}

fn prepare_annotation_rules(
    list: &MappingList,
    options: &MappingOptions,
) -> Vec<(QueryNode, QueryNode)> {
    let (pattern_foundry, pattern_layer) = options.pattern_overrides();
    let (repl_foundry, repl_layer) = options.replacement_overrides();
    annotation_pairs(list, options.direction)
        .map(|(mut pattern, mut replacement)| {
            annotation::apply_overrides(&mut pattern, pattern_foundry, pattern_layer);
            annotation::apply_overrides(&mut replacement, repl_foundry, repl_layer);
            (pattern, replacement)
        })
        .collect()
}

fn prepare_snippet_rules(
    list: &MappingList,
    options: &MappingOptions,
) -> Vec<(QueryNode, QueryNode)> {
    let (pattern_foundry, pattern_layer) = options.pattern_overrides();
    let (repl_foundry, repl_layer) = options.replacement_overrides();
    annotation_pairs(list, options.direction)
        .map(|(mut pattern, mut replacement)| {
            annotation::apply_overrides(&mut pattern, pattern_foundry, pattern_layer);
            // The layer override is selective on the replacement side:
            // terms with an explicit layer keep it.
            snippet::apply_replacement_overrides(&mut replacement, repl_foundry, repl_layer);
            (pattern, replacement)
        })
        .collect()
}

fn annotation_pairs<'a>(
    list: &'a MappingList,
    direction: Direction,
) -> impl Iterator<Item = (QueryNode, QueryNode)> + 'a {
    list.rules.iter().filter_map(move |rule| match rule {
        ListRule::Annotation(rule) => Some(oriented(&rule.upper, &rule.lower, direction)),
        ListRule::Corpus(_) => {
            warn!(list = %list.id, "skipping corpus rule in annotation list");
            None
        }
    })
}

fn prepare_corpus_rules(
    list: &MappingList,
    options: &MappingOptions,
) -> Vec<(CorpusNode, CorpusNode)> {
    let pattern_field = options.pattern_field();
    let replacement_field = options.replacement_field();
    list.rules
        .iter()
        .filter_map(|rule| match rule {
            ListRule::Corpus(rule) => {
                let (mut pattern, mut replacement) =
                    oriented(&rule.upper, &rule.lower, options.direction);
                corpus::apply_field_override(&mut pattern, pattern_field);
                corpus::apply_field_override(&mut replacement, replacement_field);
                Some((pattern, replacement))
            }
            ListRule::Annotation(_) => {
                warn!(list = %list.id, "skipping annotation rule in corpus list");
                None
            }
        })
        .collect()
}

fn apply_annotation_rules(
    rules: &[(QueryNode, QueryNode)],
    root: &mut QueryNode,
    add_rewrites: bool,
) {
    for (pattern, replacement) in rules {
        annotation::apply_rule(root, pattern, replacement, add_rewrites);
    }
}
