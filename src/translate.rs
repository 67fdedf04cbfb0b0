//! Schema node → descriptor.
//!
//! One pass, one `match` per node. Wrappers are transparent: `Optional` only
//! shows up in the parent object's `required` list and `Default` only adds a
//! `default` key. Anything the view reports as unsupported becomes
//! `{"type":"any"}`; that is a silent degradation, never an error.
//!
//! [`translate`] is total and unbounded. [`Translator::with_max_depth`] adds a
//! nesting limit for inputs whose depth is caller-controlled.
use std::convert::Infallible;
use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::descriptor::{Descriptor, DescriptorType, Format};
use crate::node::{NodeView, NumberCheck, SchemaSource, StringCheck};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("schema is nested deeper than {limit} levels (at {path})")]
    TooDeep { limit: usize, path: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    max_depth: Option<usize>,
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

/// Translate without a depth limit. Never fails.
pub fn translate<N: SchemaSource + ?Sized>(node: &N) -> Descriptor {
    match walk(node, &Unbounded, &mut Trail::default()) {
        Ok(descriptor) => descriptor,
        Err(never) => match never {},
    }
}

impl Translator {
    pub fn new() -> Self { Self::default() }

    /// Root is depth 0; every field, array element and wrapper adds one.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth: Some(max_depth) }
    }

    pub fn max_depth(&self) -> Option<usize> { self.max_depth }

    pub fn translate<N: SchemaSource + ?Sized>(&self, node: &N) -> Result<Descriptor, TranslateError> {
        match self.max_depth {
            None => Ok(translate(node)),
            Some(limit) => walk(node, &Bounded { limit }, &mut Trail::default()),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DEPTH POLICY
// ————————————————————————————————————————————————————————————————————————————

trait DepthPolicy {
    type Error;
    fn enter(&self, trail: &Trail<'_>) -> Result<(), Self::Error>;
}

struct Unbounded;

impl DepthPolicy for Unbounded {
    type Error = Infallible;
    fn enter(&self, _: &Trail<'_>) -> Result<(), Infallible> { Ok(()) }
}

struct Bounded { limit: usize }

impl DepthPolicy for Bounded {
    type Error = TranslateError;
    fn enter(&self, trail: &Trail<'_>) -> Result<(), TranslateError> {
        if trail.depth() <= self.limit {
            return Ok(());
        }
        let path = trail.to_string();
        tracing::warn!(limit = self.limit, %path, "schema nesting exceeds depth limit");
        Err(TranslateError::TooDeep { limit: self.limit, path })
    }
}

/// Where we are in the input, for diagnostics: `$.user.tags[]`.
#[derive(Default)]
struct Trail<'a> {
    segments: Vec<Segment<'a>>,
}

enum Segment<'a> {
    Field(&'a str),
    Items,
    Wrapper, // counts toward depth, invisible in the path
}

impl Trail<'_> {
    fn depth(&self) -> usize { self.segments.len() }
}

impl fmt::Display for Trail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for seg in &self.segments {
            match seg {
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Items => f.write_str("[]")?,
                Segment::Wrapper => {}
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// WALK
// ————————————————————————————————————————————————————————————————————————————

fn walk<'a, N, P>(node: &'a N, policy: &P, trail: &mut Trail<'a>) -> Result<Descriptor, P::Error>
where
    N: SchemaSource + ?Sized,
    P: DepthPolicy,
{
    policy.enter(trail)?;

    let out = match node.view() {
        NodeView::String { checks } => string_descriptor(checks),
        NodeView::Number { checks } => number_descriptor(checks),
        // no native date type in the target; lossy on purpose
        NodeView::Date => Descriptor {
            format: Some(Format::DateTime),
            ..Descriptor::of(DescriptorType::String)
        },
        NodeView::Enum { values } => Descriptor {
            enum_: Some(values.to_vec()),
            ..Descriptor::of(DescriptorType::String)
        },
        NodeView::Optional { inner } => nested(inner, Segment::Wrapper, policy, trail)?,
        NodeView::Default { inner, value } => {
            let mut out = nested(inner, Segment::Wrapper, policy, trail)?;
            // evaluated exactly once, even when the inner descriptor keeps its own
            let produced = value.produce();
            if out.default.is_none() {
                out.default = Some(produced);
            }
            out
        }
        NodeView::Object { shape } => {
            let mut properties = IndexMap::with_capacity(shape.len());
            let mut required = Vec::new();
            for (name, field) in shape {
                properties.insert(name.to_string(), nested(field, Segment::Field(name), policy, trail)?);
                if !field.is_optional() {
                    required.push(name.to_string());
                }
            }
            Descriptor {
                properties: Some(properties),
                required: if required.is_empty() { None } else { Some(required) },
                ..Descriptor::of(DescriptorType::Object)
            }
        }
        NodeView::Array { element } => Descriptor {
            items: Some(Box::new(nested(element, Segment::Items, policy, trail)?)),
            ..Descriptor::of(DescriptorType::Array)
        },
        NodeView::Unsupported => {
            tracing::debug!(path = %trail, "construct has no precise mapping; emitting fallback");
            Descriptor::any()
        }
    };

    Ok(out)
}

fn nested<'a, N, P>(
    node: &'a N,
    segment: Segment<'a>,
    policy: &P,
    trail: &mut Trail<'a>,
) -> Result<Descriptor, P::Error>
where
    N: SchemaSource + ?Sized,
    P: DepthPolicy,
{
    trail.segments.push(segment);
    let out = walk(node, policy, trail);
    trail.segments.pop();
    out
}

// Checks are scanned in order; a later match overwrites an earlier one.
fn string_descriptor(checks: &[StringCheck]) -> Descriptor {
    let mut out = Descriptor::of(DescriptorType::String);
    for check in checks {
        match check.kind.as_str() {
            "email" => out.format = Some(Format::Email),
            "url" => out.format = Some(Format::Uri),
            _ => {}
        }
    }
    out
}

fn number_descriptor(checks: &[NumberCheck]) -> Descriptor {
    let mut out = Descriptor::of(DescriptorType::Number);
    for check in checks {
        match (check.kind.as_str(), check.value) {
            ("min", Some(v)) => out.minimum = Some(v),
            ("max", Some(v)) => out.maximum = Some(v),
            _ => {}
        }
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use indexmap::IndexMap;
    use serde_json::{json, Value};

    use super::*;
    use crate::node::{DefaultValue, SchemaNode};

    fn string_with(kinds: &[&str]) -> SchemaNode {
        SchemaNode::String {
            checks: kinds.iter().map(|k| StringCheck::new(*k, None)).collect(),
        }
    }

    fn number_with(checks: &[(&str, f64)]) -> SchemaNode {
        SchemaNode::Number {
            checks: checks.iter().map(|(k, v)| NumberCheck::new(*k, Some(*v))).collect(),
        }
    }

    fn object(fields: Vec<(&str, SchemaNode)>) -> SchemaNode {
        SchemaNode::Object {
            shape: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn enum_of(values: &[&str]) -> SchemaNode {
        SchemaNode::Enum { values: values.iter().map(|s| s.to_string()).collect() }
    }

    fn literal(v: Value) -> DefaultValue { DefaultValue::Literal(v) }

    #[test]
    fn string_formats() {
        assert_eq!(translate(&string_with(&["email"])).to_value(), json!({"type": "string", "format": "email"}));
        assert_eq!(translate(&string_with(&["url"])).to_value(), json!({"type": "string", "format": "uri"}));
        assert_eq!(translate(&string_with(&["min", "trim"])).to_value(), json!({"type": "string"}));
        // last match wins
        assert_eq!(translate(&string_with(&["email", "url"])).format, Some(Format::Uri));
        assert_eq!(translate(&string_with(&["url", "email"])).format, Some(Format::Email));
    }

    #[test]
    fn number_bounds_are_copied_exactly() {
        let d = translate(&number_with(&[("min", -2.5), ("max", 1e9), ("int", 0.0)]));
        assert_eq!(d.minimum, Some(-2.5));
        assert_eq!(d.maximum, Some(1e9));
        assert_eq!(translate(&number_with(&[("min", 1.0), ("min", 4.0)])).minimum, Some(4.0));
    }

    #[test]
    fn valueless_number_checks_are_ignored() {
        let node = SchemaNode::Number { checks: vec![NumberCheck::new("min", None)] };
        assert_eq!(translate(&node).to_value(), json!({"type": "number"}));
    }

    #[test]
    fn date_and_enum() {
        assert_eq!(translate(&SchemaNode::Date).to_value(), json!({"type": "string", "format": "date-time"}));
        assert_eq!(
            translate(&enum_of(&["b", "a", "c"])).to_value(),
            json!({"type": "string", "enum": ["b", "a", "c"]})
        );
    }

    #[test]
    fn optional_is_transparent() {
        let samples = [
            string_with(&["email"]),
            number_with(&[("max", 3.0)]),
            SchemaNode::Date,
            enum_of(&["x"]),
            object(vec![("a", SchemaNode::string())]),
            SchemaNode::Date.array_of(),
            SchemaNode::Unsupported,
        ];
        for node in samples {
            assert_eq!(translate(&node.clone().optional()), translate(&node));
        }
    }

    #[test]
    fn default_adds_the_produced_value() {
        let inner = number_with(&[("min", 1.0)]);
        let mut expected = translate(&inner);
        expected.default = Some(json!(5));
        assert_eq!(translate(&inner.with_default(literal(json!(5)))), expected);
    }

    #[test]
    fn default_producer_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let node = SchemaNode::Date.with_default(DefaultValue::producer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            json!("2024-01-01T00:00:00Z")
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let d = translate(&node);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(d.default, Some(json!("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn inner_default_takes_precedence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let node = SchemaNode::string()
            .with_default(literal(json!("inner")))
            .with_default(DefaultValue::producer(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                json!("outer")
            }));
        assert_eq!(translate(&node).default, Some(json!("inner")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn required_lists_non_optional_fields_in_order() {
        let node = object(vec![
            ("z", SchemaNode::string()),
            ("a", SchemaNode::string().optional()),
            ("m", SchemaNode::number().with_default(literal(json!(0)))),
            ("b", SchemaNode::string().optional().with_default(literal(json!("x")))),
        ]);
        let d = translate(&node);
        assert_eq!(d.required, Some(vec!["z".to_string(), "m".to_string(), "b".to_string()]));
        let keys: Vec<_> = d.properties.unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m", "b"]);
    }

    #[test]
    fn required_is_omitted_when_all_fields_are_optional() {
        let node = object(vec![("a", SchemaNode::string().optional())]);
        assert_eq!(
            translate(&node).to_value(),
            json!({"type": "object", "properties": {"a": {"type": "string"}}})
        );
        assert_eq!(translate(&object(vec![])).to_value(), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn array_items_equal_element_translation() {
        let element = object(vec![("id", SchemaNode::string())]);
        let d = translate(&element.clone().array_of());
        assert_eq!(d.type_, DescriptorType::Array);
        assert_eq!(d.items.as_deref(), Some(&translate(&element)));
    }

    #[test]
    fn unsupported_is_exactly_any() {
        assert_eq!(translate(&SchemaNode::Unsupported).to_value(), json!({"type": "any"}));
        let nested = object(vec![("u", SchemaNode::Unsupported)]);
        assert_eq!(
            translate(&nested).to_value(),
            json!({"type": "object", "properties": {"u": {"type": "any"}}, "required": ["u"]})
        );
    }

    #[test]
    fn user_profile_example() {
        let node = object(vec![
            ("id", SchemaNode::string()),
            ("email", string_with(&["email"])),
            ("displayName", SchemaNode::string().optional()),
            ("createdAt", SchemaNode::Date),
        ]);
        let text = serde_json::to_string(&translate(&node)).unwrap();
        assert_eq!(
            text,
            r#"{"type":"object","properties":{"id":{"type":"string"},"email":{"type":"string","format":"email"},"displayName":{"type":"string"},"createdAt":{"type":"string","format":"date-time"}},"required":["id","email","createdAt"]}"#
        );
    }

    #[test]
    fn enum_default_example() {
        let node = enum_of(&["light", "dark", "system"]).with_default(literal(json!("system")));
        let text = serde_json::to_string(&translate(&node)).unwrap();
        assert_eq!(text, r#"{"type":"string","enum":["light","dark","system"],"default":"system"}"#);
    }

    #[test]
    fn bounded_number_array_example() {
        let node = number_with(&[("min", 0.0), ("max", 10.0)]).array_of();
        let text = serde_json::to_string(&translate(&node)).unwrap();
        assert_eq!(text, r#"{"type":"array","items":{"type":"number","minimum":0,"maximum":10}}"#);
    }

    #[test]
    fn translation_is_deterministic() {
        let node = object(vec![
            ("tags", enum_of(&["a", "b"]).array_of().optional()),
            ("score", number_with(&[("min", 0.0)]).with_default(literal(json!(1)))),
        ]);
        assert_eq!(translate(&node), translate(&node));
    }

    #[test]
    fn depth_limit_fails_past_the_limit_and_names_the_path() {
        let node = object(vec![("a", object(vec![("b", SchemaNode::string().array_of())]))]);
        // $ (0) → .a (1) → .b (2) → [] (3)
        assert!(Translator::with_max_depth(3).translate(&node).is_ok());
        let err = Translator::with_max_depth(2).translate(&node).unwrap_err();
        assert_eq!(err, TranslateError::TooDeep { limit: 2, path: "$.a.b[]".into() });
        assert!(err.to_string().contains("deeper than 2 levels"));
    }

    #[test]
    fn wrappers_count_toward_depth() {
        let node = SchemaNode::string().optional().optional();
        assert!(Translator::with_max_depth(1).translate(&node).is_err());
        assert!(Translator::with_max_depth(2).translate(&node).is_ok());
    }

    #[test]
    fn unbounded_translator_matches_translate() {
        let node = object(vec![("a", SchemaNode::Date)]);
        assert_eq!(Translator::new().translate(&node).unwrap(), translate(&node));
        assert_eq!(Translator::new().max_depth(), None);
    }

    #[test]
    fn concurrent_translations_are_independent() {
        let trees: Vec<SchemaNode> = (0..8)
            .map(|i| number_with(&[("min", i as f64)]).array_of())
            .collect();
        std::thread::scope(|scope| {
            for (i, tree) in trees.iter().enumerate() {
                scope.spawn(move || {
                    let d = translate(tree);
                    assert_eq!(d.items.unwrap().minimum, Some(i as f64));
                });
            }
        });
    }

    // A schema type that is not `SchemaNode`: translation only needs the view.
    enum Mini {
        Text,
        Record(IndexMap<String, Mini>),
        Maybe(Box<Mini>),
        Opaque,
    }

    impl SchemaSource for Mini {
        fn view(&self) -> NodeView<'_, Self> {
            match self {
                Mini::Text => NodeView::String { checks: &[] },
                Mini::Record(fields) => NodeView::Object {
                    shape: fields.iter().map(|(k, v)| (k.as_str(), v)).collect(),
                },
                Mini::Maybe(inner) => NodeView::Optional { inner: &**inner },
                Mini::Opaque => NodeView::Unsupported,
            }
        }
    }

    #[test]
    fn any_schema_source_can_be_translated() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), Mini::Text);
        fields.insert("nick".to_string(), Mini::Maybe(Box::new(Mini::Text)));
        fields.insert("blob".to_string(), Mini::Opaque);
        assert_eq!(
            translate(&Mini::Record(fields)).to_value(),
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}, "nick": {"type": "string"}, "blob": {"type": "any"}},
                "required": ["name", "blob"]
            })
        );
    }
}
