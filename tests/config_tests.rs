//! Configuration loading and startup behaviour.

mod helpers;

use std::io::Write;

use helpers::annotation_list;
use koral_mapper::config::{expand_pattern, load_list_file, Config};
use koral_mapper::MappingEngine;
use tempfile::TempDir;

#[test]
fn main_config_and_engine_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
port: 5725
loglevel: debug
lists:
  - id: stts-upos
    foundryA: opennlp
    layerA: p
    foundryB: upos
    layerB: p
    mappings:
      - "[PIDAT] <> [DET]"
      - "[NN] <> [NOUN]"
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.port, Some(5725));

    let engine = MappingEngine::from_configs(&config.lists).unwrap();
    let list = engine.list("stts-upos").unwrap();
    assert_eq!(list.rules.len(), 2);
    assert_eq!(list.defaults.foundry_a, "opennlp");
}

#[test]
fn glob_pattern_collects_list_files() {
    let dir = TempDir::new().unwrap();
    for (name, id) in [("one.yaml", "first"), ("two.yaml", "second")] {
        let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
        write!(file, "id: {id}\nmappings:\n  - \"[a] <> [b]\"\n").unwrap();
    }
    std::fs::write(dir.path().join("ignore.txt"), "not yaml").unwrap();

    let pattern = dir.path().join("*.yaml");
    let mut paths = expand_pattern(pattern.to_str().unwrap());
    paths.sort();
    assert_eq!(paths.len(), 2);

    let mut ids: Vec<String> = paths
        .iter()
        .map(|p| load_list_file(p).unwrap().id)
        .collect();
    ids.sort();
    assert_eq!(ids, ["first", "second"]);
}

#[test]
fn bad_rule_fails_startup_with_the_offending_list() {
    let lists = vec![annotation_list("broken", ("", "", "", ""), &["[a <> [b]"])];
    let err = MappingEngine::from_configs(&lists).unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let err = Config::from_file(std::path::Path::new("/no/such/config.yaml")).unwrap_err();
    assert!(err.to_string().contains("/no/such/config.yaml"));
}
