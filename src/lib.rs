//! # koral-mapper
//!
//! A rewriting service for KoralQuery, the JSON representation of corpus
//! queries and responses in the KorAP search infrastructure. It
//! translates annotations between linguistic tagsets and corpus metadata
//! between naming schemes, in both the query-rewriting and the
//! response-enrichment direction, and can chain several mappings into a
//! cascade.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! server   → axum routes, parameter validation, error payloads
//!   ↓
//! engine   → mapping engine, cascade fold, options, cfg parameter
//!   ↓
//! matcher  → annotation and corpus matchers and replacement engines
//! snippet  → HTML span tokenizer and annotation injection
//!   ↓
//! rule     → rule lexer and the two rule-dialect parsers
//!   ↓
//! koral    → KoralQuery tree model and JSON conversion
//! config   → YAML configuration, list files, env overrides
//! ```
//!
//! Rules are parsed once at startup and immutable afterwards; every
//! request works on its own clones, so concurrent transforms never share
//! mutable state.

/// KoralQuery tree model: query/corpus node types, rewrites, JSON layer.
pub mod koral;

/// Mapping-rule grammar: lexer and the annotation/corpus dialect parsers.
pub mod rule;

/// Pattern matchers and replacement engines for both dialects.
pub mod matcher;

/// Response snippet tokenizer and annotation injection.
pub mod snippet;

/// Service configuration: YAML model, list files, glob expansion.
pub mod config;

/// Mapping engine, cascade driver, and the `cfg` parameter syntax.
pub mod engine;

/// Thin HTTP surface over the engine.
pub mod server;

// Re-export the types a typical embedder needs.
pub use config::{Config, ListKind, MappingListConfig};
pub use engine::{
    build_cfg, parse_cfg, CascadeStep, Direction, MapperError, MappingEngine, MappingOptions,
};
