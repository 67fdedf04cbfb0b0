//! Input side of translation: one node of a validation schema.
//!
//! [`SchemaNode`] is the owned, closed variant set that both front ends
//! (DSL and JSON) build. The translator never matches on it directly; it reads
//! nodes through [`SchemaSource`], so any schema-like type can be translated
//! as long as it can present itself as a [`NodeView`].
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaNode {
    String {
        #[serde(default)]
        checks: Vec<StringCheck>,
    },
    Number {
        #[serde(default)]
        checks: Vec<NumberCheck>,
    },
    Date,
    Enum { values: Vec<String> },
    Optional { inner: Box<SchemaNode> },
    Default {
        inner: Box<SchemaNode>,
        value: DefaultValue,
    },
    Object {
        shape: IndexMap<String, SchemaNode>, // visit order == declaration order
    },
    Array { element: Box<SchemaNode> },
    /// Unions, tuples, records, effects… anything without a precise mapping.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StringCheck {
    pub kind: String,          // "email", "url", "min", …
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumberCheck {
    pub kind: String,          // "min", "max", "int", …
    #[serde(default)]
    pub value: Option<f64>,    // None for flag-like checks such as `int`
}

/// Value a `Default` wrapper supplies when the field is absent.
///
/// Producers are opaque: the translator calls them, once, and keeps whatever
/// comes back.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

// ————————————————————————————————————————————————————————————————————————————
// CAPABILITY VIEW
// ————————————————————————————————————————————————————————————————————————————

/// Borrowed, variant-tagged view of a node. This is the only shape the
/// translator dispatches on.
pub enum NodeView<'a, N: ?Sized> {
    String { checks: &'a [StringCheck] },
    Number { checks: &'a [NumberCheck] },
    Date,
    Enum { values: &'a [String] },
    Optional { inner: &'a N },
    Default { inner: &'a N, value: &'a DefaultValue },
    Object { shape: Vec<(&'a str, &'a N)> },
    Array { element: &'a N },
    Unsupported,
}

/// Anything that can present itself as a schema node.
pub trait SchemaSource {
    fn view(&self) -> NodeView<'_, Self>;

    fn is_optional(&self) -> bool {
        matches!(self.view(), NodeView::Optional { .. })
    }
}

impl SchemaSource for SchemaNode {
    fn view(&self) -> NodeView<'_, Self> {
        match self {
            SchemaNode::String { checks } => NodeView::String { checks: checks.as_slice() },
            SchemaNode::Number { checks } => NodeView::Number { checks: checks.as_slice() },
            SchemaNode::Date => NodeView::Date,
            SchemaNode::Enum { values } => NodeView::Enum { values: values.as_slice() },
            SchemaNode::Optional { inner } => NodeView::Optional { inner: &**inner },
            SchemaNode::Default { inner, value } => NodeView::Default { inner: &**inner, value },
            SchemaNode::Object { shape } => NodeView::Object {
                shape: shape.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            },
            SchemaNode::Array { element } => NodeView::Array { element: &**element },
            SchemaNode::Unsupported => NodeView::Unsupported,
        }
    }

    fn is_optional(&self) -> bool {
        matches!(self, SchemaNode::Optional { .. })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaNode {
    pub fn string() -> Self { SchemaNode::String { checks: Vec::new() } }
    pub fn number() -> Self { SchemaNode::Number { checks: Vec::new() } }

    pub fn optional(self) -> Self {
        SchemaNode::Optional { inner: Box::new(self) }
    }

    pub fn with_default(self, value: DefaultValue) -> Self {
        SchemaNode::Default { inner: Box::new(self), value }
    }

    pub fn array_of(self) -> Self {
        SchemaNode::Array { element: Box::new(self) }
    }

    /// Short lowercase name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::String { .. } => "string",
            SchemaNode::Number { .. } => "number",
            SchemaNode::Date => "date",
            SchemaNode::Enum { .. } => "enum",
            SchemaNode::Optional { .. } => "optional",
            SchemaNode::Default { .. } => "default",
            SchemaNode::Object { .. } => "object",
            SchemaNode::Array { .. } => "array",
            SchemaNode::Unsupported => "unsupported",
        }
    }
}

impl StringCheck {
    pub fn new(kind: impl Into<String>, value: Option<Value>) -> Self {
        Self { kind: kind.into(), value }
    }
}

impl NumberCheck {
    pub fn new(kind: impl Into<String>, value: Option<f64>) -> Self {
        Self { kind: kind.into(), value }
    }
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Literal(v) => v.clone(),
            DefaultValue::Producer(f) => f(),
        }
    }

    pub fn producer<F>(f: F) -> Self where F: Fn() -> Value + Send + Sync + 'static {
        DefaultValue::Producer(Arc::new(f))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

// Encoded nodes can only carry literals.
impl<'de> Deserialize<'de> for DefaultValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(DefaultValue::Literal)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
