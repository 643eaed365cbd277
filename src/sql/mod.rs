//! SQL handling for model-generated statements.
//!
//! - `dialect`: row-limit syntax and parser dialect per target
//! - `sanitizer`: textual rewriting of model output into a bounded, schema-qualified SELECT
//! - `validator`: AST check that the sanitized text is exactly one read-only query

pub mod dialect;
pub mod sanitizer;
pub mod validator;

pub use dialect::SqlDialect;
pub use sanitizer::{DENIED_VERBS, SanitizedQuery, Sanitizer, sanitize};
pub use validator::validate_single_select;
