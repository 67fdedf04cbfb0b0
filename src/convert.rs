//! Source text → descriptor(s): the one entry point presentation layers need.
//!
//! Either a descriptor comes back or a single human-readable error does;
//! callers keep their previous output on failure.
use serde_json::Value;
use thiserror::Error;

use crate::descriptor::Descriptor;
use crate::dsl::{self, ParseError};
use crate::node::SchemaNode;
use crate::path_de::{self, DecodeError};
use crate::translate::{TranslateError, Translator};

// ------------------------------- Policy ---------------------------------- //

pub const DEFAULT_MAX_DEPTH: usize = 128;      // schema nesting (translator)
pub const DEFAULT_MAX_NESTING: usize = 512;    // bracket nesting (DSL parser)

// ------------------------------- Types ----------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    Dsl,                       // z.object({...})
    Json,                      // {"kind": "object", ...}
}

#[derive(Debug, Clone)]
pub struct Options {
    pub format: InputFormat,
    pub max_depth: usize,
    pub max_nesting: usize,
    /// JSON input only: select a subdocument before decoding.
    pub json_pointer: Option<String>,
    /// JSON input only: jq program applied before decoding; may yield many nodes.
    pub jq_expr: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON pointer `{0}` matched nothing")]
    PointerMiss(String),
    #[error("{0:#}")]
    Jq(anyhow::Error),
    #[error("jq program produced no output")]
    NothingSelected,
    #[error("expected one schema, jq program selected {0}")]
    Ambiguous(usize),
}

// ------------------------------- Front API ------------------------------- //

impl Default for Options {
    fn default() -> Self {
        Self {
            format: InputFormat::Dsl,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nesting: DEFAULT_MAX_NESTING,
            json_pointer: None,
            jq_expr: None,
        }
    }
}

impl Options {
    pub fn translator(&self) -> Translator {
        Translator::with_max_depth(self.max_depth)
    }
}

/// Build the schema node(s) described by `text`.
pub fn load_nodes(text: &str, options: &Options) -> Result<Vec<SchemaNode>, ConvertError> {
    match options.format {
        InputFormat::Dsl => Ok(vec![dsl::parse(text, options.max_nesting)?]),
        InputFormat::Json => {
            let mut doc: Value = serde_json::from_str(text)?;
            if let Some(pointer) = options.json_pointer.as_deref() {
                doc = doc
                    .pointer(pointer)
                    .cloned()
                    .ok_or_else(|| ConvertError::PointerMiss(pointer.to_string()))?;
            }
            let docs = match options.jq_expr.as_deref() {
                None => vec![doc],
                Some(expr) => crate::jq_exec::select_nodes(expr, &doc).map_err(ConvertError::Jq)?,
            };
            if docs.is_empty() {
                return Err(ConvertError::NothingSelected);
            }
            docs.into_iter()
                .map(|d| path_de::node_from_value(d).map_err(ConvertError::from))
                .collect()
        }
    }
}

/// Text → every descriptor it describes (JSON input with jq may yield several).
pub fn convert_all(text: &str, options: &Options) -> Result<Vec<Descriptor>, ConvertError> {
    let translator = options.translator();
    load_nodes(text, options)?
        .iter()
        .map(|node| translator.translate(node).map_err(ConvertError::from))
        .collect()
}

/// Text → exactly one descriptor. A jq program that selects several nodes is
/// an error here; use [`convert_all`] for that.
pub fn convert_source(text: &str, options: &Options) -> Result<Descriptor, ConvertError> {
    let mut descriptors = convert_all(text, options)?;
    match descriptors.len() {
        1 => Ok(descriptors.remove(0)),
        0 => Err(ConvertError::NothingSelected),
        n => Err(ConvertError::Ambiguous(n)),
    }
}

// ------------------------------- Tests ----------------------------------- //

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const USER: &str = r#"z.object({
  id: z.string(),
  email: z.string().email(),
  displayName: z.string().optional(),
  createdAt: z.date(),
})"#;

    fn json_options() -> Options {
        Options { format: InputFormat::Json, ..Options::default() }
    }

    #[test]
    fn user_profile_from_source() {
        let d = convert_source(USER, &Options::default()).unwrap();
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"type":"object","properties":{"id":{"type":"string"},"email":{"type":"string","format":"email"},"displayName":{"type":"string"},"createdAt":{"type":"string","format":"date-time"}},"required":["id","email","createdAt"]}"#
        );
    }

    #[test]
    fn theme_default_from_source() {
        let d = convert_source(r#"z.enum(["light", "dark", "system"]).default("system")"#, &Options::default()).unwrap();
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"type":"string","enum":["light","dark","system"],"default":"system"}"#
        );
    }

    #[test]
    fn bounded_array_from_source() {
        let d = convert_source("z.array(z.number().min(0).max(10))", &Options::default()).unwrap();
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"type":"array","items":{"type":"number","minimum":0,"maximum":10}}"#
        );
    }

    #[test]
    fn full_profile_with_nested_preferences() {
        let src = r#"z.object({
  id: z.string(),
  photoURL: z.string().url().optional(),
  preferences: z.object({
    theme: z.enum(["light", "dark", "system"]).default("system"),
    language: z.enum(["en", "tr"]).default("en"),
  }).optional(),
})"#;
        let d = convert_source(src, &Options::default()).unwrap();
        assert_eq!(d.to_value(), json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "photoURL": {"type": "string", "format": "uri"},
                "preferences": {
                    "type": "object",
                    "properties": {
                        "theme": {"type": "string", "enum": ["light", "dark", "system"], "default": "system"},
                        "language": {"type": "string", "enum": ["en", "tr"], "default": "en"}
                    },
                    "required": ["theme", "language"]
                }
            },
            "required": ["id"]
        }));
    }

    #[test]
    fn depth_limit_is_enforced_through_options() {
        let options = Options { max_depth: 1, ..Options::default() };
        let err = convert_source("z.object({ a: z.array(z.string()) })", &options).unwrap_err();
        assert!(matches!(err, ConvertError::Translate(TranslateError::TooDeep { .. })));
    }

    #[test]
    fn long_wrapper_chains_are_rejected_not_built() {
        for wrapper in [".optional()", ".array()", ".default(1)"] {
            let src = format!("z.number(){}", wrapper.repeat(100_000));
            match convert_source(&src, &Options::default()) {
                Err(ConvertError::Parse(ParseError::TooDeep { limit, line: 1, .. })) => {
                    assert_eq!(limit, DEFAULT_MAX_NESTING);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        let src = format!("z.number(){}", ".optional()".repeat(DEFAULT_MAX_NESTING));
        let options = Options { max_depth: DEFAULT_MAX_NESTING, ..Options::default() };
        assert_eq!(convert_source(&src, &options).unwrap().to_value(), json!({"type": "number"}));
    }

    #[test]
    fn construction_failures_surface_as_messages() {
        let err = convert_source("z.object({ a: z.sting() })", &Options::default()).unwrap_err();
        assert_eq!(err.to_string(), "1:16: unknown schema builder `z.sting()`");
    }

    #[test]
    fn json_nodes_with_pointer_and_jq() {
        let doc = r#"{"schemas": {"user": {"kind": "object", "shape": {"n": {"kind": "number"}}}, "tag": {"kind": "enum", "values": ["a"]}}}"#;

        let options = Options { json_pointer: Some("/schemas/user".into()), ..json_options() };
        assert_eq!(
            convert_source(doc, &options).unwrap().to_value(),
            json!({"type": "object", "properties": {"n": {"type": "number"}}, "required": ["n"]})
        );

        let options = Options { jq_expr: Some(".schemas[]".into()), ..json_options() };
        let all = convert_all(doc, &options).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].to_value(), json!({"type": "string", "enum": ["a"]}));
        assert!(matches!(convert_source(doc, &options), Err(ConvertError::Ambiguous(2))));

        let options = Options { json_pointer: Some("/missing".into()), ..json_options() };
        assert!(matches!(convert_source(doc, &options), Err(ConvertError::PointerMiss(_))));

        let options = Options { jq_expr: Some("empty".into()), ..json_options() };
        assert!(matches!(convert_all(doc, &options), Err(ConvertError::NothingSelected)));
    }

    #[test]
    fn json_unknown_kinds_fall_back() {
        let d = convert_source(r#"{"kind": "tuple", "items": []}"#, &json_options()).unwrap();
        assert!(d.is_fallback());
        assert!(matches!(convert_source("{", &json_options()), Err(ConvertError::Json(_))));
    }
}
