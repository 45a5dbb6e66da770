//! KoralQuery tree model.
//!
//! Typed node trees for the two KoralQuery dialects this service rewrites:
//! the query dialect (`koral:token` / `koral:termGroup` / `koral:term`)
//! and the corpus dialect (`koral:doc` / `koral:docGroup` and their
//! `field` spellings), plus the `koral:rewrite` audit record and the JSON
//! conversion layer.

pub mod corpus;
pub mod error;
pub mod json;
pub mod query;
pub mod rewrite;

pub use corpus::{
    CorpusField, CorpusGroup, CorpusMatch, CorpusNode, CorpusTag, FieldValueType, GroupOp,
    OpaqueCorpus,
};
pub use error::KoralError;
pub use json::{corpus_from_json, corpus_to_json, query_from_json, query_to_json};
pub use query::{Catchall, QueryNode, Relation, Term, TermGroup, TermMatch, Token};
pub use rewrite::Rewrite;
