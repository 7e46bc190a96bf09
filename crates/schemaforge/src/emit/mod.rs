//! Deterministic artifact emission.
//!
//! Both emitters produce `(filename, content)` pairs; persisting them is the
//! host's job. Output is byte-identical across runs given the same input and
//! starting timestamp.

pub mod migrations;
pub mod models;

pub use migrations::{MigrationEmitter, MigrationOptions};
pub use models::ModelEmitter;

use crate::schema::DefaultValue;

/// One generated artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Quote a string as a single-quoted PHP literal.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Render a default value as an argument literal; expressions are wrapped in
/// the raw-SQL marker.
pub(crate) fn render_default(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Str(s) => quote(s),
        DefaultValue::Int(i) => i.to_string(),
        DefaultValue::Float(f) => f.to_string(),
        DefaultValue::Bool(b) => b.to_string(),
        DefaultValue::Expression(e) => format!("DB::raw({})", quote(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("draft"), "'draft'");
        assert_eq!(quote("it's"), r"'it\'s'");
        assert_eq!(quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_render_default() {
        assert_eq!(render_default(&DefaultValue::Str("new".into())), "'new'");
        assert_eq!(render_default(&DefaultValue::Int(42)), "42");
        assert_eq!(render_default(&DefaultValue::Float(0.5)), "0.5");
        assert_eq!(render_default(&DefaultValue::Bool(true)), "true");
        assert_eq!(
            render_default(&DefaultValue::Expression("CURRENT_TIMESTAMP".into())),
            "DB::raw('CURRENT_TIMESTAMP')"
        );
    }
}
