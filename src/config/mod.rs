//! Service configuration.
//!
//! The main YAML file carries server settings plus a `lists` sequence of
//! mapping lists; an individual mapping-list file is a single list object
//! without the `lists` wrapper:
//!
//! ```yaml
//! id: stts-upos
//! type: annotation
//! description: STTS to Universal POS
//! foundryA: opennlp
//! layerA: p
//! foundryB: upos
//! layerB: p
//! mappings:
//!   - "[PIDAT] <> [DET]"
//! ```
//!
//! Additional list sources may be given as glob patterns; a pattern that
//! matches nothing is treated as a literal filename. Environment
//! variables prefixed `KORAL_MAPPER_` override the corresponding fields.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::rule::{ListDefaults, RuleParseError};

/// Errors raised while loading configuration or mapping lists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("duplicate mapping list ID '{0}'")]
    DuplicateId(String),

    #[error("mapping list '{list}': {source}")]
    Rule {
        list: String,
        #[source]
        source: RuleParseError,
    },

    #[error("mapping list ID must not be empty")]
    EmptyId,
}

/// Log threshold names accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The corresponding tracing filter directive.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Which rule dialect a mapping list uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    #[default]
    Annotation,
    Corpus,
}

/// The main configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    // URLs embedded into the plugin page.
    pub sdk: Option<String>,
    pub server: Option<String>,
    pub stylesheet: Option<String>,
    #[serde(rename = "serviceURL")]
    pub service_url: Option<String>,
    #[serde(rename = "cookieName")]
    pub cookie_name: Option<String>,

    pub port: Option<u16>,
    pub loglevel: Option<LogLevel>,
    pub lists: Vec<MappingListConfig>,
}

/// One mapping list as configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MappingListConfig {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ListKind,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "foundryA", default)]
    pub foundry_a: String,
    #[serde(rename = "layerA", default)]
    pub layer_a: String,
    #[serde(rename = "foundryB", default)]
    pub foundry_b: String,
    #[serde(rename = "layerB", default)]
    pub layer_b: String,
    #[serde(rename = "fieldA", default)]
    pub field_a: String,
    #[serde(rename = "fieldB", default)]
    pub field_b: String,
    #[serde(default)]
    pub mappings: Vec<String>,
}

impl MappingListConfig {
    /// The side defaults this list fills into its rules.
    pub fn defaults(&self) -> ListDefaults {
        ListDefaults {
            foundry_a: self.foundry_a.as_str().into(),
            layer_a: self.layer_a.as_str().into(),
            foundry_b: self.foundry_b.as_str().into(),
            layer_b: self.layer_b.as_str().into(),
            field_a: self.field_a.as_str().into(),
            field_b: self.field_b.as_str().into(),
        }
    }
}

impl Config {
    /// Load the main configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `KORAL_MAPPER_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = env_var("PORT") {
            match port.parse() {
                Ok(port) => self.port = Some(port),
                Err(_) => warn!(%port, "ignoring unparseable KORAL_MAPPER_PORT"),
            }
        }
        if let Some(level) = env_var("LOGLEVEL") {
            match LogLevel::parse(&level) {
                Some(level) => self.loglevel = Some(level),
                None => warn!(%level, "ignoring unknown KORAL_MAPPER_LOGLEVEL"),
            }
        }
        for (name, field) in [
            ("SDK", &mut self.sdk),
            ("SERVER", &mut self.server),
            ("STYLESHEET", &mut self.stylesheet),
            ("SERVICE_URL", &mut self.service_url),
            ("COOKIE_NAME", &mut self.cookie_name),
        ] {
            if let Some(value) = env_var(name) {
                *field = Some(value);
            }
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("KORAL_MAPPER_{name}")).ok()
}

/// Load a single mapping-list file.
pub fn load_list_file(path: &Path) -> Result<MappingListConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand a glob pattern into matching paths. A pattern that matches
/// nothing (or does not parse as a glob) is taken as a literal filename.
pub fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => {
            let found: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
            if found.is_empty() {
                vec![PathBuf::from(pattern)]
            } else {
                found
            }
        }
        Err(_) => vec![PathBuf::from(pattern)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
sdk: "https://korap.ids-mannheim.de/js/korap-plugin.js"
serviceURL: "https://example.org/plugin/mapper"
port: 5725
loglevel: warn
lists:
  - id: stts-upos
    description: STTS to Universal POS
    foundryA: opennlp
    layerA: p
    mappings:
      - "[PIDAT] <> [DET]"
  - id: wiki-derecko
    type: corpus
    fieldA: category
    fieldB: textClass
    mappings:
      - "novel <> fiction"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, Some(5725));
        assert_eq!(config.loglevel, Some(LogLevel::Warn));
        assert_eq!(config.lists.len(), 2);
        assert_eq!(config.lists[0].kind, ListKind::Annotation);
        assert_eq!(config.lists[1].kind, ListKind::Corpus);
        assert_eq!(config.lists[1].field_a, "category");
    }

    #[test]
    fn list_file_is_a_single_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "id: solo\nfoundryA: opennlp\nmappings:\n  - \"[a] <> [b]\"\n"
        )
        .unwrap();
        let list = load_list_file(file.path()).unwrap();
        assert_eq!(list.id, "solo");
        assert_eq!(list.mappings.len(), 1);
    }

    #[test]
    fn unmatched_pattern_is_literal() {
        let paths = expand_pattern("/no/such/dir/lists-*.yaml");
        assert_eq!(paths, vec![PathBuf::from("/no/such/dir/lists-*.yaml")]);
    }
}
