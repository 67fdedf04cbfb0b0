//! Schema-definition language front end.
//!
//! Turns zod-style builder source such as
//!
//! ```text
//! z.object({
//!   id: z.string(),
//!   email: z.string().email(),
//!   tags: z.array(z.enum(["a", "b"])).optional(),
//! })
//! ```
//!
//! into a [`SchemaNode`]. The text is parsed against a fixed grammar; it is
//! never executed. Two stages:
//! - [`grammar`]: pest grammar → syntax tree of calls and literals.
//! - [`build`]: syntax tree → node, validating builder/method names and
//!   argument shapes.
pub mod build;
pub mod grammar;

use thiserror::Error;

use crate::node::SchemaNode;

/// Why source text did not produce a schema. Every variant is positioned
/// (1-based line and column) so callers can point at the offending spot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax { line: usize, column: usize, message: String },

    #[error("{line}:{column}: expected a schema (z.…), found {found}")]
    NotASchema { found: &'static str, line: usize, column: usize },

    #[error("{line}:{column}: unknown schema builder `z.{name}()`")]
    UnknownBuilder { name: String, line: usize, column: usize },

    #[error("{line}:{column}: `.{method}()` is not available on a {target} schema")]
    UnknownMethod { method: String, target: &'static str, line: usize, column: usize },

    #[error("{line}:{column}: `{call}()` expects {expected}")]
    InvalidArgument { call: String, expected: &'static str, line: usize, column: usize },

    #[error("{line}:{column}: input is nested deeper than {limit} levels")]
    TooDeep { limit: usize, line: usize, column: usize },
}

/// Parse schema source. `max_nesting` bounds both bracket depth in the text
/// and the depth of the resulting node tree.
pub fn parse(source: &str, max_nesting: usize) -> Result<SchemaNode, ParseError> {
    grammar::check_nesting(source, max_nesting)?;
    let parsed = grammar::parse_source(source)?;
    if let Some(name) = &parsed.binding {
        tracing::debug!(binding = %name, "parsing schema declaration");
    }
    build::build(&parsed.value, max_nesting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_runs_guard_grammar_and_builder() {
        assert!(matches!(parse("z.array(z.string())", 8), Ok(SchemaNode::Array { .. })));
        assert!(matches!(parse("z.array(z.array(z.string()))", 2), Err(ParseError::TooDeep { .. })));
        assert!(matches!(parse("z.array(", 8), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("'hello'", 8), Err(ParseError::NotASchema { .. })));
    }

    #[test]
    fn errors_read_well() {
        let err = parse("z.object({ a: z.number().email() })", 8).unwrap_err();
        assert_eq!(err.to_string(), "1:25: `.email()` is not available on a number schema");
    }
}
