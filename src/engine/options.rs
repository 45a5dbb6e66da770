//! Per-request mapping options.

use smol_str::SmolStr;

/// Which rule side acts as the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Upper (A) side matches, lower (B) side replaces.
    #[default]
    AtoB,
    /// Lower (B) side matches, upper (A) side replaces.
    BtoA,
}

impl Direction {
    /// The wire spelling, `atob` or `btoa`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AtoB => "atob",
            Self::BtoA => "btoa",
        }
    }

    /// Parse the wire spelling; anything else is invalid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "atob" => Some(Self::AtoB),
            "btoa" => Some(Self::BtoA),
            _ => None,
        }
    }
}

/// Options of a single mapping application.
///
/// Foundry/layer/field values are call-time overrides keyed by rule side;
/// empty means "no override" (the list defaults are already baked into
/// the parsed rules). `add_rewrites` turns on the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingOptions {
    pub direction: Direction,
    pub foundry_a: SmolStr,
    pub layer_a: SmolStr,
    pub foundry_b: SmolStr,
    pub layer_b: SmolStr,
    pub field_a: SmolStr,
    pub field_b: SmolStr,
    pub add_rewrites: bool,
}

impl MappingOptions {
    /// Options with a direction and no overrides.
    pub fn with_direction(direction: Direction) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    /// The (foundry, layer) override for the pattern side.
    pub fn pattern_overrides(&self) -> (&str, &str) {
        match self.direction {
            Direction::AtoB => (&self.foundry_a, &self.layer_a),
            Direction::BtoA => (&self.foundry_b, &self.layer_b),
        }
    }

    /// The (foundry, layer) override for the replacement side.
    pub fn replacement_overrides(&self) -> (&str, &str) {
        match self.direction {
            Direction::AtoB => (&self.foundry_b, &self.layer_b),
            Direction::BtoA => (&self.foundry_a, &self.layer_a),
        }
    }

    /// The field-key override for the pattern side.
    pub fn pattern_field(&self) -> &str {
        match self.direction {
            Direction::AtoB => &self.field_a,
            Direction::BtoA => &self.field_b,
        }
    }

    /// The field-key override for the replacement side.
    pub fn replacement_field(&self) -> &str {
        match self.direction {
            Direction::AtoB => &self.field_b,
            Direction::BtoA => &self.field_a,
        }
    }
}
