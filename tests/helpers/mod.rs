//! Shared fixtures for integration tests.
#![allow(dead_code)]

use koral_mapper::{ListKind, MappingEngine, MappingListConfig};

/// An annotation-dialect list with side defaults.
pub fn annotation_list(
    id: &str,
    sides: (&str, &str, &str, &str),
    mappings: &[&str],
) -> MappingListConfig {
    let (foundry_a, layer_a, foundry_b, layer_b) = sides;
    MappingListConfig {
        id: id.to_string(),
        kind: ListKind::Annotation,
        description: format!("test list {id}"),
        foundry_a: foundry_a.to_string(),
        layer_a: layer_a.to_string(),
        foundry_b: foundry_b.to_string(),
        layer_b: layer_b.to_string(),
        field_a: String::new(),
        field_b: String::new(),
        mappings: mappings.iter().map(|s| s.to_string()).collect(),
    }
}

/// A corpus-dialect list with field defaults.
pub fn corpus_list(id: &str, fields: (&str, &str), mappings: &[&str]) -> MappingListConfig {
    let (field_a, field_b) = fields;
    MappingListConfig {
        id: id.to_string(),
        kind: ListKind::Corpus,
        description: format!("test list {id}"),
        foundry_a: String::new(),
        layer_a: String::new(),
        foundry_b: String::new(),
        layer_b: String::new(),
        field_a: field_a.to_string(),
        field_b: field_b.to_string(),
        mappings: mappings.iter().map(|s| s.to_string()).collect(),
    }
}

/// Build an engine or die trying; list configuration is test-controlled.
pub fn engine(lists: Vec<MappingListConfig>) -> MappingEngine {
    MappingEngine::from_configs(&lists).expect("test lists must parse")
}
