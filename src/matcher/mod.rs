//! Pattern matchers and replacement engines.
//!
//! One matcher per rule dialect: [`annotation`] rewrites query trees,
//! [`corpus`] rewrites corpus trees and enriches flat response fields.
//! Both share the same shape: a structural match predicate over typed
//! node trees, and an in-place replacement that clones the rule's
//! replacement side and optionally attaches a rewrite audit record.

pub mod annotation;
pub mod corpus;
