//! Cascade parameter syntax.
//!
//! A cascade is given as a compact URL parameter: entries separated by
//! `;`, each entry one of
//!
//! ```text
//! id ':' dir                                          (no overrides)
//! id ':' dir ':' foundryA ':' layerA ':' foundryB ':' layerB
//! id ':' dir ':' fieldA ':' fieldB
//! ```
//!
//! Empty override positions fall back to the list defaults at apply
//! time. [`build_cfg`] emits the shortest form that loses nothing, which
//! makes `parse_cfg(build_cfg(steps)) == steps` for all valid steps.

use super::error::MapperError;
use super::options::{Direction, MappingOptions};

/// One step of a cascade: a mapping list plus its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeStep {
    pub id: String,
    pub options: MappingOptions,
}

impl CascadeStep {
    /// A step with a direction and no overrides.
    pub fn new(id: impl Into<String>, direction: Direction) -> Self {
        Self {
            id: id.into(),
            options: MappingOptions::with_direction(direction),
        }
    }
}

/// Characters allowed in mapping list IDs and override values.
pub fn valid_component(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Parse a cascade parameter. The empty string is the empty cascade.
pub fn parse_cfg(cfg: &str) -> Result<Vec<CascadeStep>, MapperError> {
    let cfg = cfg.trim();
    if cfg.is_empty() {
        return Ok(Vec::new());
    }
    cfg.split(';').map(parse_entry).collect()
}

fn parse_entry(entry: &str) -> Result<CascadeStep, MapperError> {
    let entry = entry.trim();
    let bad = || MapperError::InvalidCfg(entry.to_string());

    let parts: Vec<&str> = entry.split(':').collect();
    let (id, dir) = match parts.as_slice() {
        [id, dir] | [id, dir, _, _] | [id, dir, _, _, _, _] => (*id, *dir),
        _ => return Err(bad()),
    };
    if id.is_empty() || !valid_component(id) {
        return Err(bad());
    }
    for part in &parts[2..] {
        if !valid_component(part) {
            return Err(bad());
        }
    }
    let direction =
        Direction::parse(dir).ok_or_else(|| MapperError::InvalidDirection(dir.to_string()))?;

    let mut options = MappingOptions::with_direction(direction);
    match parts.as_slice() {
        [_, _] => {}
        [_, _, field_a, field_b] => {
            options.field_a = (*field_a).into();
            options.field_b = (*field_b).into();
        }
        [_, _, foundry_a, layer_a, foundry_b, layer_b] => {
            options.foundry_a = (*foundry_a).into();
            options.layer_a = (*layer_a).into();
            options.foundry_b = (*foundry_b).into();
            options.layer_b = (*layer_b).into();
        }
        _ => unreachable!("arity checked above"),
    }
    Ok(CascadeStep {
        id: id.to_string(),
        options,
    })
}

/// Serialise a cascade back to the parameter syntax.
pub fn build_cfg(steps: &[CascadeStep]) -> String {
    steps
        .iter()
        .map(build_entry)
        .collect::<Vec<_>>()
        .join(";")
}

fn build_entry(step: &CascadeStep) -> String {
    let o = &step.options;
    let dir = o.direction.as_str();
    if !o.field_a.is_empty() || !o.field_b.is_empty() {
        format!("{}:{}:{}:{}", step.id, dir, o.field_a, o.field_b)
    } else if !o.foundry_a.is_empty()
        || !o.layer_a.is_empty()
        || !o.foundry_b.is_empty()
        || !o.layer_b.is_empty()
    {
        format!(
            "{}:{}:{}:{}:{}:{}",
            step.id, dir, o.foundry_a, o.layer_a, o.foundry_b, o.layer_b
        )
    } else {
        format!("{}:{}", step.id, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_forms() {
        let steps =
            parse_cfg("short:atob;anno:btoa:opennlp:p::;corp:atob:category:textClass").unwrap();
        assert_eq!(steps.len(), 3);

        assert_eq!(steps[0], CascadeStep::new("short", Direction::AtoB));

        assert_eq!(steps[1].options.direction, Direction::BtoA);
        assert_eq!(steps[1].options.foundry_a, "opennlp");
        assert_eq!(steps[1].options.layer_a, "p");
        assert!(steps[1].options.foundry_b.is_empty());

        assert_eq!(steps[2].options.field_a, "category");
        assert_eq!(steps[2].options.field_b, "textClass");
    }

    #[test]
    fn empty_cfg_is_the_empty_cascade() {
        assert_eq!(parse_cfg("").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_wrong_arity_and_bad_direction() {
        assert!(matches!(
            parse_cfg("id:atob:justone"),
            Err(MapperError::InvalidCfg(_))
        ));
        assert!(matches!(
            parse_cfg("id:down"),
            Err(MapperError::InvalidDirection(_))
        ));
        assert!(matches!(parse_cfg(":atob"), Err(MapperError::InvalidCfg(_))));
    }

    #[test]
    fn rejects_foreign_characters() {
        assert!(parse_cfg("id with space:atob").is_err());
        assert!(parse_cfg("id:atob:foo/bar:l::").is_err());
    }

    #[test]
    fn build_then_parse_is_identity() {
        let steps = parse_cfg("a:atob;b:btoa:f1:l1:f2:l2;c:atob:fa:fb;d:btoa:::f2:").unwrap();
        assert_eq!(parse_cfg(&build_cfg(&steps)).unwrap(), steps);
    }

    #[test]
    fn build_emits_the_short_form_when_possible() {
        let steps = vec![CascadeStep::new("plain", Direction::BtoA)];
        assert_eq!(build_cfg(&steps), "plain:btoa");
    }
}
