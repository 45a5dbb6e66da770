//! Cross-cutting properties of the engine and the parameter syntax.

mod helpers;

use helpers::{annotation_list, corpus_list, engine};
use koral_mapper::matcher::annotation::node_matches;
use koral_mapper::rule::{parse_annotation_rule, ListDefaults};
use koral_mapper::{build_cfg, parse_cfg, CascadeStep, Direction, MappingOptions};
use rstest::rstest;
use serde_json::{json, Value};

fn pidat_token() -> Value {
    json!({
        "@type": "koral:token",
        "wrap": {"@type": "koral:term", "foundry": "opennlp", "layer": "p", "key": "PIDAT"}
    })
}

#[test]
fn unknown_nodes_survive_a_transform_bit_identically() {
    let engine = engine(vec![annotation_list(
        "l",
        ("", "", "", ""),
        &["[PIDAT] <> [DET]"],
    )]);
    let input = json!({
        "@type": "koral:span",
        "attr": {"@type": "koral:attr", "deep": [1, 2, {"x": null}]},
        "operands": [
            {"@type": "koral:group", "operands": [
                {"@type": "koral:span", "wrap": {"no": "type"}}
            ]}
        ]
    });
    let out = engine
        .map_query("l", &MappingOptions::default(), input.clone())
        .unwrap();
    assert_eq!(out, input);
}

#[test]
fn rule_set_is_unchanged_by_transforms() {
    let engine = engine(vec![
        annotation_list(
            "anno",
            ("opennlp", "p", "upos", "p"),
            &["[PIDAT] <> [DET & AdjType:Pdt]"],
        ),
        corpus_list("corp", ("", ""), &["textClass=novel <> genre=fiction"]),
    ]);
    let before: Vec<_> = engine.lists().cloned().collect();

    let mut opts = MappingOptions::with_direction(Direction::AtoB);
    opts.foundry_b = "custom".into();
    opts.add_rewrites = true;
    engine.map_query("anno", &opts, pidat_token()).unwrap();
    engine
        .map_query(
            "corp",
            &opts,
            json!({"@type": "koral:doc", "key": "textClass", "value": "novel"}),
        )
        .unwrap();
    engine
        .map_response(
            "anno",
            &opts,
            json!({"snippet": "<span title=\"opennlp/p:PIDAT\">die</span>"}),
        )
        .unwrap();

    let after: Vec<_> = engine.lists().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn singleton_cascade_equals_direct_application() {
    let engine = engine(vec![annotation_list(
        "l",
        ("", "", "upos", "p"),
        &["[PIDAT] <> [DET]"],
    )]);
    let opts = MappingOptions::with_direction(Direction::AtoB);
    let direct = engine.map_query("l", &opts, pidat_token()).unwrap();
    let cascaded = engine
        .map_query_cascade(
            &[CascadeStep {
                id: "l".to_string(),
                options: opts,
            }],
            pidat_token(),
        )
        .unwrap();
    assert_eq!(direct, cascaded);
}

#[test]
fn empty_cascade_is_identity() {
    let engine = engine(vec![]);
    let input = json!({"query": {"@type": "koral:token", "wrap": {"@type": "koral:term", "key": "x"}}});
    assert_eq!(engine.map_query_cascade(&[], input.clone()).unwrap(), input);
    assert_eq!(
        engine.map_response_cascade(&[], input.clone()).unwrap(),
        input
    );
}

#[rstest]
#[case("a:atob")]
#[case("a:btoa;b:atob")]
#[case("a:atob:opennlp:p:upos:p")]
#[case("a:atob:opennlp:::")]
#[case("a:btoa:category:textClass")]
#[case("a:atob;b:btoa:f:l:f2:l2;c:atob:fa:fb")]
fn cfg_round_trips(#[case] cfg: &str) {
    let steps = parse_cfg(cfg).unwrap();
    assert_eq!(parse_cfg(&build_cfg(&steps)).unwrap(), steps);
}

#[test]
fn and_matching_is_commutative() {
    let defaults = ListDefaults::default();
    let rule = parse_annotation_rule("[a & b:v & c] <> [x]", &defaults).unwrap();
    let forward = parse_annotation_rule("[x] <> [a & b:v & c]", &defaults).unwrap();
    let reversed = parse_annotation_rule("[x] <> [c & a & b:v]", &defaults).unwrap();

    // The same node set matches the pattern regardless of operand order
    // on either side.
    assert!(node_matches(&rule.upper, &forward.lower));
    assert!(node_matches(&rule.upper, &reversed.lower));

    let shuffled_pattern = parse_annotation_rule("[c & b:v & a] <> [x]", &defaults).unwrap();
    assert!(node_matches(&shuffled_pattern.upper, &forward.lower));
}

#[test]
fn rewrites_record_the_original_subtree() {
    let engine = engine(vec![annotation_list(
        "l",
        ("", "", "upos", "p"),
        &["[PIDAT] <> [DET]"],
    )]);
    let mut opts = MappingOptions::with_direction(Direction::AtoB);
    opts.add_rewrites = true;
    let out = engine.map_query("l", &opts, pidat_token()).unwrap();

    let rewrites = out["wrap"]["rewrites"].as_array().unwrap();
    assert_eq!(rewrites.len(), 1);
    assert_eq!(rewrites[0]["@type"], "koral:rewrite");
    assert_eq!(rewrites[0]["editor"], "Koral-Mapper");
    // PIDAT→DET changes key, foundry, and layer, so the original subtree
    // is recorded in full.
    assert_eq!(rewrites[0]["original"]["key"], "PIDAT");
}

#[test]
fn existing_rewrites_are_preserved_and_normalised() {
    let engine = engine(vec![annotation_list("l", ("", "", "", ""), &[])]);
    let input = json!({
        "query": {
            "@type": "koral:token",
            "wrap": {"@type": "koral:term", "key": "PIDAT"},
            "rewrites": [
                {"@type": "koral:rewrite", "editor": "Kustvakt", "source": "legacy", "_comment": "old"}
            ]
        }
    });
    let out = engine
        .map_query("l", &MappingOptions::default(), input)
        .unwrap();

    let rewrite = &out["query"]["rewrites"][0];
    assert_eq!(rewrite["editor"], "Kustvakt");
    assert_eq!(rewrite["src"], "legacy");
    assert_eq!(rewrite["comment"], "old");
}
