use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::node::SchemaNode;

/// Decode failure with the JSON path of the offending node.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("at JSON path {path} → {message}")]
pub struct DecodeError {
    pub path: String,
    pub message: String,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DecodeError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_decode_error)
}

pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(into_decode_error)
}

/// Tagged JSON (`{"kind": "object", "shape": {…}}`) → node.
pub fn node_from_str(src: &str) -> Result<SchemaNode, DecodeError> {
    from_str_with_path(src)
}

pub fn node_from_value(value: Value) -> Result<SchemaNode, DecodeError> {
    from_value_with_path(value)
}

fn into_decode_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> DecodeError {
    DecodeError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn errors_carry_path_and_cause() {
        let err = node_from_str(r#"{"kind":"object","shape":{"a":{"kind":"enum","values":[1]}}}"#).unwrap_err();
        assert!(err.message.contains("invalid type"), "message was {}", err.message);
        assert!(err.to_string().starts_with("at JSON path "));

        let err = node_from_str(r#"{"kind":"optional"}"#).unwrap_err();
        assert!(err.message.contains("inner"), "message was {}", err.message);
    }

    #[test]
    fn values_decode_like_text() {
        let node = node_from_value(json!({"kind": "array", "element": {"kind": "date"}})).unwrap();
        assert!(matches!(node, SchemaNode::Array { .. }));
    }
}
