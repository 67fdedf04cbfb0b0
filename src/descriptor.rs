//! Output side of translation: a JSON-Schema-ish descriptor tree.
//!
//! Field declaration order is the serialized key order.
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorType {
    String,
    Number,
    Object,
    Array,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "date-time")]
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub type_: DescriptorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_bound")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_bound")]
    pub maximum: Option<f64>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Descriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>, // never Some(empty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Descriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,         // set by the wrapper, after everything else
}

impl Descriptor {
    pub fn of(type_: DescriptorType) -> Self {
        Self {
            type_,
            format: None,
            minimum: None,
            maximum: None,
            enum_: None,
            properties: None,
            required: None,
            items: None,
            default: None,
        }
    }

    /// The fallback descriptor: `{"type":"any"}`.
    pub fn any() -> Self { Self::of(DescriptorType::Any) }

    pub fn is_fallback(&self) -> bool {
        *self == Self::any()
    }

    pub fn to_value(&self) -> Value {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `Some` when `n` is a whole number that converts to `i64` without loss.
/// `i64::MAX as f64` rounds up to 2^63, which is already out of range.
pub fn exact_i64(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64).then_some(n as i64)
}

// Prefer integers when exact, so `min(0)` renders as `0` and not `0.0`.
#[allow(clippy::ref_option)] // serde serialize_with mandates &Option<T>
fn serialize_bound<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(n) => match exact_i64(*n) {
            Some(i) => serializer.serialize_some(&i),
            None => serializer.serialize_some(n),
        },
        None => serializer.serialize_none(),
    }
}
