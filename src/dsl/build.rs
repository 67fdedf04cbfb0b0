//! Syntax tree → [`SchemaNode`].
//!
//! Mirrors what the schema library itself would construct: the builder creates
//! a node and each chained method records a check on it or reshapes it.
//! Constructs the translator has no mapping for still parse; they
//! become [`SchemaNode::Unsupported`].
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::ParseError;
use super::grammar::{Call, Pos, Term, TermKind};
use crate::descriptor::exact_i64;
use crate::node::{DefaultValue, NumberCheck, SchemaNode, StringCheck};

// ------------------------------- Catalog --------------------------------- //

/// Builders the library offers that have no descriptor mapping.
const UNSUPPORTED_BUILDERS: &[&str] = &[
    "any", "bigint", "boolean", "custom", "discriminatedUnion", "function",
    "instanceof", "intersection", "lazy", "literal", "map", "nan", "nativeEnum",
    "never", "null", "nullable", "preprocess", "promise", "record", "set",
    "symbol", "tuple", "undefined", "union", "unknown", "void",
];

/// Methods available on every schema that turn it into a different, unmapped
/// construct such as a union or an effect.
const UNSUPPORTED_WRAPPERS: &[&str] = &[
    "and", "brand", "catch", "nullable", "nullish", "or", "pipe", "readonly",
    "refine", "superRefine", "transform",
];

/// String methods that record a check of the same name.
const STRING_CHECKS: &[&str] = &[
    "base64", "cidr", "cuid", "cuid2", "date", "datetime", "duration", "email",
    "emoji", "endsWith", "includes", "ip", "length", "max", "min", "nanoid",
    "regex", "startsWith", "time", "toLowerCase", "toUpperCase", "trim", "ulid",
    "url", "uuid",
];

/// Builders that also exist as `z.coerce.<name>()`; coercion has no
/// descriptor effect.
const COERCIBLE_BUILDERS: &[&str] = &["bigint", "boolean", "date", "number", "string"];

/// Chained methods that put a new node above the current one.
const WRAPPING_METHODS: &[&str] = &["array", "default", "optional"];

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// --------------------------------- Depth --------------------------------- //

/// Schema nesting while building: the root is 0 and every wrapper, field or
/// element adds one. Chains like `.optional().optional()…` add no brackets,
/// so this is checked here rather than by the bracket pre-scan.
#[derive(Debug, Clone, Copy)]
struct Depth {
    at: usize,
    limit: usize,
}

impl Depth {
    fn down(self, pos: Pos) -> Result<Depth, ParseError> {
        let at = self.at + 1;
        if at > self.limit {
            return Err(ParseError::TooDeep { limit: self.limit, line: pos.line, column: pos.column });
        }
        Ok(Depth { at, ..self })
    }
}

// ------------------------------ Entry point ------------------------------ //

/// `max_nesting` bounds how deep the resulting node tree may get.
pub fn build(term: &Term, max_nesting: usize) -> Result<SchemaNode, ParseError> {
    match &term.kind {
        TermKind::Chain(calls) => build_chain(calls, term.pos, Depth { at: 0, limit: max_nesting }),
        other => Err(ParseError::NotASchema {
            found: other.describe(),
            line: term.pos.line,
            column: term.pos.column,
        }),
    }
}

fn build_chain(calls: &[Call], pos: Pos, depth: Depth) -> Result<SchemaNode, ParseError> {
    let Some((builder, methods)) = calls.split_first() else {
        return Err(ParseError::NotASchema { found: "an empty chain", line: pos.line, column: pos.column });
    };
    // the builder's node sits below every wrapper chained after it
    let mut depth = depth;
    for method in methods.iter().filter(|m| WRAPPING_METHODS.contains(&m.name.as_str())) {
        depth = depth.down(method.pos)?;
    }
    let mut node = build_builder(builder, depth)?;
    for method in methods {
        node = apply_method(node, method, depth)?;
    }
    Ok(node)
}

// -------------------------------- Builders ------------------------------- //

fn build_builder(call: &Call, depth: Depth) -> Result<SchemaNode, ParseError> {
    let name = match call.name.strip_prefix("coerce.") {
        Some(plain) if COERCIBLE_BUILDERS.contains(&plain) => plain,
        Some(_) => return Err(unknown_builder(call)),
        None => call.name.as_str(),
    };
    match name {
        "string" => Ok(SchemaNode::string()),
        "number" => Ok(SchemaNode::number()),
        "date" => Ok(SchemaNode::Date),
        "enum" => Ok(SchemaNode::Enum { values: string_list(call, 0)? }),
        "object" => Ok(SchemaNode::Object { shape: shape_arg(call, 0, depth)? }),
        "array" => Ok(schema_arg(call, 0, depth)?.array_of()),
        "optional" => Ok(schema_arg(call, 0, depth)?.optional()),
        name if UNSUPPORTED_BUILDERS.contains(&name) => {
            check_nested(&call.args, depth)?;
            tracing::debug!(builder = name, line = call.pos.line, "unsupported builder; will translate to `any`");
            Ok(SchemaNode::Unsupported)
        }
        _ => Err(unknown_builder(call)),
    }
}

// -------------------------------- Methods -------------------------------- //

fn apply_method(node: SchemaNode, call: &Call, depth: Depth) -> Result<SchemaNode, ParseError> {
    match call.name.as_str() {
        "optional" => return Ok(node.optional()),
        "default" => return Ok(node.with_default(default_arg(call)?)),
        "array" => return Ok(node.array_of()),
        "describe" => return Ok(node),
        name if UNSUPPORTED_WRAPPERS.contains(&name) => {
            check_nested(&call.args, depth)?;
            tracing::debug!(method = name, line = call.pos.line, "unsupported wrapper; will translate to `any`");
            return Ok(SchemaNode::Unsupported);
        }
        _ => {}
    }

    match node {
        SchemaNode::String { mut checks } => {
            checks.extend(string_checks(call)?);
            Ok(SchemaNode::String { checks })
        }
        SchemaNode::Number { mut checks } => {
            checks.extend(number_checks(call)?);
            Ok(SchemaNode::Number { checks })
        }
        SchemaNode::Object { shape } => object_method(shape, call, depth),
        SchemaNode::Array { element } => match call.name.as_str() {
            "min" | "max" | "length" | "nonempty" => Ok(SchemaNode::Array { element }),
            "element" => Ok(*element),
            _ => Err(unknown_method(call, "array")),
        },
        SchemaNode::Enum { values } => match call.name.as_str() {
            "extract" => Ok(SchemaNode::Enum { values: string_list(call, 0)? }),
            "exclude" => {
                let drop = string_list(call, 0)?;
                Ok(SchemaNode::Enum { values: values.into_iter().filter(|v| !drop.contains(v)).collect() })
            }
            _ => Err(unknown_method(call, "enum")),
        },
        SchemaNode::Date => match call.name.as_str() {
            "min" | "max" => Ok(SchemaNode::Date),
            _ => Err(unknown_method(call, "date")),
        },
        SchemaNode::Optional { inner } if call.name == "unwrap" => Ok(*inner),
        SchemaNode::Default { inner, .. } if call.name == "removeDefault" => Ok(*inner),
        SchemaNode::Unsupported => {
            check_nested(&call.args, depth)?;
            Ok(SchemaNode::Unsupported)
        }
        other => Err(unknown_method(call, other.kind_name())),
    }
}

fn string_checks(call: &Call) -> Result<Vec<StringCheck>, ParseError> {
    match call.name.as_str() {
        "nonempty" => Ok(vec![StringCheck::new("min", Some(Value::from(1)))]),
        name if STRING_CHECKS.contains(&name) => Ok(vec![StringCheck::new(name, first_scalar(call))]),
        _ => Err(unknown_method(call, "string")),
    }
}

fn number_checks(call: &Call) -> Result<Vec<NumberCheck>, ParseError> {
    let checks = match call.name.as_str() {
        // exclusivity is not representable downstream; gt/lt collapse onto min/max
        "min" | "gte" | "gt" => vec![NumberCheck::new("min", Some(number_arg(call, 0)?))],
        "max" | "lte" | "lt" => vec![NumberCheck::new("max", Some(number_arg(call, 0)?))],
        "positive" | "nonnegative" => vec![NumberCheck::new("min", Some(0.0))],
        "negative" | "nonpositive" => vec![NumberCheck::new("max", Some(0.0))],
        "int" | "finite" => vec![NumberCheck::new(call.name.as_str(), None)],
        "multipleOf" | "step" => vec![NumberCheck::new("multipleOf", Some(number_arg(call, 0)?))],
        "safe" => vec![
            NumberCheck::new("min", Some(-MAX_SAFE_INTEGER)),
            NumberCheck::new("max", Some(MAX_SAFE_INTEGER)),
        ],
        _ => return Err(unknown_method(call, "number")),
    };
    Ok(checks)
}

fn object_method(
    mut shape: IndexMap<String, SchemaNode>,
    call: &Call,
    depth: Depth,
) -> Result<SchemaNode, ParseError> {
    match call.name.as_str() {
        "strict" | "passthrough" | "strip" | "nonstrict" => {}
        "catchall" => check_nested(&call.args, depth)?,
        "partial" => {
            let mask = optional_mask(call)?;
            shape = shape
                .into_iter()
                .map(|(k, v)| {
                    let selected = mask.as_ref().is_none_or(|m| m.contains(&k));
                    let v = if selected && !matches!(v, SchemaNode::Optional { .. }) { v.optional() } else { v };
                    (k, v)
                })
                .collect();
        }
        "required" => {
            let mask = optional_mask(call)?;
            shape = shape
                .into_iter()
                .map(|(k, mut v)| {
                    if mask.as_ref().is_none_or(|m| m.contains(&k)) {
                        while let SchemaNode::Optional { inner } = v {
                            v = *inner;
                        }
                    }
                    (k, v)
                })
                .collect();
        }
        "extend" => shape.extend(shape_arg(call, 0, depth)?),
        "merge" => match schema_arg(call, 0, depth)? {
            SchemaNode::Object { shape: other } => shape.extend(other),
            _ => return Err(invalid_argument(call, "an object schema")),
        },
        "pick" => {
            // result follows the mask's key order
            let mask = mask_arg(call, 0)?;
            let mut picked = IndexMap::new();
            for key in mask {
                if let Some(v) = shape.shift_remove(&key) {
                    picked.insert(key, v);
                }
            }
            shape = picked;
        }
        "omit" => {
            let mask = mask_arg(call, 0)?;
            shape.retain(|k, _| !mask.contains(k));
        }
        "keyof" => return Ok(SchemaNode::Enum { values: shape.into_keys().collect() }),
        _ => return Err(unknown_method(call, "object")),
    }
    Ok(SchemaNode::Object { shape })
}

// ------------------------------- Arguments ------------------------------- //

fn arg<'a>(call: &'a Call, index: usize, expected: &'static str) -> Result<&'a Term, ParseError> {
    call.args.get(index).ok_or_else(|| invalid_argument(call, expected))
}

fn schema_arg(call: &Call, index: usize, depth: Depth) -> Result<SchemaNode, ParseError> {
    let term = arg(call, index, "a schema")?;
    match &term.kind {
        TermKind::Chain(calls) => build_chain(calls, term.pos, depth.down(term.pos)?),
        _ => Err(invalid_argument(call, "a schema")),
    }
}

fn shape_arg(call: &Call, index: usize, depth: Depth) -> Result<IndexMap<String, SchemaNode>, ParseError> {
    const EXPECTED: &str = "an object literal of field schemas";
    let TermKind::Object(entries) = &arg(call, index, EXPECTED)?.kind else {
        return Err(invalid_argument(call, EXPECTED));
    };
    let mut shape = IndexMap::with_capacity(entries.len());
    for (key, term) in entries {
        let TermKind::Chain(calls) = &term.kind else {
            return Err(invalid_argument(call, EXPECTED));
        };
        shape.insert(key.clone(), build_chain(calls, term.pos, depth.down(term.pos)?)?);
    }
    Ok(shape)
}

fn string_list(call: &Call, index: usize) -> Result<Vec<String>, ParseError> {
    const EXPECTED: &str = "an array of strings";
    let TermKind::Array(items) = &arg(call, index, EXPECTED)?.kind else {
        return Err(invalid_argument(call, EXPECTED));
    };
    items
        .iter()
        .map(|item| match &item.kind {
            TermKind::Str(s) => Ok(s.clone()),
            _ => Err(invalid_argument(call, EXPECTED)),
        })
        .collect()
}

fn number_arg(call: &Call, index: usize) -> Result<f64, ParseError> {
    match arg(call, index, "a finite number")?.kind {
        TermKind::Num(n) if n.is_finite() => Ok(n),
        _ => Err(invalid_argument(call, "a finite number")),
    }
}

/// `{ key: true, … }` → keys whose value is truthy.
fn mask_arg(call: &Call, index: usize) -> Result<Vec<String>, ParseError> {
    const EXPECTED: &str = "an object literal of field names";
    let TermKind::Object(entries) = &arg(call, index, EXPECTED)?.kind else {
        return Err(invalid_argument(call, EXPECTED));
    };
    Ok(entries
        .iter()
        .filter(|(_, v)| is_truthy(&v.kind))
        .map(|(k, _)| k.clone())
        .collect())
}

fn optional_mask(call: &Call) -> Result<Option<Vec<String>>, ParseError> {
    if call.args.is_empty() { Ok(None) } else { mask_arg(call, 0).map(Some) }
}

fn default_arg(call: &Call) -> Result<DefaultValue, ParseError> {
    let term = arg(call, 0, "a default value")?;
    let body = match &term.kind {
        TermKind::Arrow(body) => body.as_ref(),
        _ => term,
    };
    literal_value(body)
        .map(DefaultValue::Literal)
        .ok_or_else(|| invalid_argument(call, "a literal default value"))
}

fn literal_value(term: &Term) -> Option<Value> {
    match &term.kind {
        TermKind::Str(s) => Some(Value::from(s.clone())),
        TermKind::Num(n) => json_number(*n),
        TermKind::Bool(b) => Some(Value::from(*b)),
        TermKind::Null => Some(Value::Null),
        TermKind::Array(items) => items.iter().map(literal_value).collect::<Option<Vec<_>>>().map(Value::Array),
        TermKind::Object(entries) => entries
            .iter()
            .map(|(k, v)| literal_value(v).map(|v| (k.clone(), v)))
            .collect::<Option<Map<_, _>>>()
            .map(Value::Object),
        TermKind::Chain(_) | TermKind::Arrow(_) | TermKind::Undefined | TermKind::Regex(_) => None,
    }
}

fn first_scalar(call: &Call) -> Option<Value> {
    match &call.args.first()?.kind {
        TermKind::Str(s) | TermKind::Regex(s) => Some(Value::from(s.clone())),
        TermKind::Num(n) => json_number(*n),
        TermKind::Bool(b) => Some(Value::from(*b)),
        _ => None, // options objects such as `{ message }`
    }
}

// Prefer integers when exact.
fn json_number(n: f64) -> Option<Value> {
    match exact_i64(n) {
        Some(i) => Some(Value::from(i)),
        None => Number::from_f64(n).map(Value::Number),
    }
}

fn is_truthy(kind: &TermKind) -> bool {
    match kind {
        TermKind::Bool(b) => *b,
        TermKind::Num(n) => *n != 0.0 && !n.is_nan(),
        TermKind::Str(s) => !s.is_empty(),
        TermKind::Null | TermKind::Undefined => false,
        _ => true,
    }
}

/// Schemas nested in arguments of unmapped constructs must still be valid.
fn check_nested(args: &[Term], depth: Depth) -> Result<(), ParseError> {
    for term in args {
        match &term.kind {
            TermKind::Chain(calls) => {
                build_chain(calls, term.pos, depth.down(term.pos)?)?;
            }
            TermKind::Array(items) => check_nested(items, depth)?,
            TermKind::Object(entries) => {
                for (_, v) in entries {
                    check_nested(std::slice::from_ref(v), depth)?;
                }
            }
            TermKind::Arrow(body) => check_nested(std::slice::from_ref(body.as_ref()), depth)?,
            _ => {}
        }
    }
    Ok(())
}

fn unknown_builder(call: &Call) -> ParseError {
    ParseError::UnknownBuilder {
        name: call.name.clone(),
        line: call.pos.line,
        column: call.pos.column,
    }
}

fn unknown_method(call: &Call, target: &'static str) -> ParseError {
    ParseError::UnknownMethod {
        method: call.name.clone(),
        target,
        line: call.pos.line,
        column: call.pos.column,
    }
}

fn invalid_argument(call: &Call, expected: &'static str) -> ParseError {
    ParseError::InvalidArgument {
        call: call.name.clone(),
        expected,
        line: call.pos.line,
        column: call.pos.column,
    }
}

// ------------------------------- Tests ----------------------------------- //
