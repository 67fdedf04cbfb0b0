//! Text → syntax tree.
//!
//! The pest grammar only knows about calls and literals; which builders and
//! methods exist, and what their arguments must look like, is decided later
//! in [`super::build`].
use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::ParseError;

#[derive(Parser)]
#[grammar = "dsl/zod.pest"]
struct ZodGrammar;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub binding: Option<String>,   // `const UserSchema = …`
    pub value: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Chain(Vec<Call>),              // first call is the `z.<builder>(…)`, named `coerce.<builder>` under `z.coerce`
    Arrow(Box<Term>),              // `() => value`
    Object(Vec<(String, Term)>),
    Array(Vec<Term>),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
    Regex(String),                 // kept verbatim, flags included
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Term>,
    pub pos: Pos,
}

impl TermKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TermKind::Chain(_) => "a schema",
            TermKind::Arrow(_) => "an arrow function",
            TermKind::Object(_) => "an object literal",
            TermKind::Array(_) => "an array literal",
            TermKind::Str(_) => "a string",
            TermKind::Num(_) => "a number",
            TermKind::Bool(_) => "a boolean",
            TermKind::Null => "null",
            TermKind::Undefined => "undefined",
            TermKind::Regex(_) => "a regular expression",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PARSE
// ————————————————————————————————————————————————————————————————————————————

pub fn parse_source(text: &str) -> Result<Source, ParseError> {
    let mut pairs = ZodGrammar::parse(Rule::source, text).map_err(syntax_error)?;
    let locator = &mut Locator::new(text);
    let mut binding = None;
    let mut value = None;
    if let Some(source) = pairs.next() {
        for pair in source.into_inner() {
            match pair.as_rule() {
                Rule::binding => {
                    binding = pair
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::ident)
                        .map(|p| p.as_str().to_string());
                }
                Rule::EOI => {}
                _ => value = Some(build_term(pair, locator)?),
            }
        }
    }
    match value {
        Some(value) => Ok(Source { binding, value }),
        None => Err(ParseError::Syntax { line: 1, column: 1, message: "empty input".into() }),
    }
}

fn build_term(pair: Pair<'_, Rule>, locator: &mut Locator<'_>) -> Result<Term, ParseError> {
    let pos = locator.locate(pair.as_span().start());
    let kind = match pair.as_rule() {
        Rule::chain => {
            let mut coerced = false;
            let mut calls = Vec::new();
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::coerce => coerced = true,
                    _ => calls.push(build_call(part, locator)?),
                }
            }
            if let (true, Some(builder)) = (coerced, calls.first_mut()) {
                builder.name = format!("coerce.{}", builder.name);
            }
            TermKind::Chain(calls)
        }
        Rule::arrow => match pair.into_inner().next() {
            Some(body) => TermKind::Arrow(Box::new(build_term(body, locator)?)),
            None => return Err(unexpected(pos, "arrow function without a body")),
        },
        Rule::object => {
            let mut entries = Vec::new();
            for entry in pair.into_inner() {
                let mut parts = entry.into_inner();
                let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                    return Err(unexpected(pos, "malformed object entry"));
                };
                let key = match key.as_rule() {
                    Rule::string => string_contents(key, locator)?,
                    _ => key.as_str().to_string(),
                };
                entries.push((key, build_term(val, locator)?));
            }
            TermKind::Object(entries)
        }
        Rule::array => TermKind::Array(
            pair.into_inner().map(|item| build_term(item, locator)).collect::<Result<Vec<_>, _>>()?,
        ),
        Rule::string => TermKind::Str(string_contents(pair, locator)?),
        Rule::number => {
            let text = pair.as_str();
            let n = text.parse::<f64>().map_err(|e| unexpected(pos, &format!("bad number `{text}`: {e}")))?;
            TermKind::Num(n)
        }
        Rule::boolean => TermKind::Bool(pair.as_str() == "true"),
        Rule::null => TermKind::Null,
        Rule::undefined => TermKind::Undefined,
        Rule::regex => TermKind::Regex(pair.as_str().to_string()),
        other => return Err(unexpected(pos, &format!("unexpected {other:?}"))),
    };
    Ok(Term { kind, pos })
}

fn build_call(pair: Pair<'_, Rule>, locator: &mut Locator<'_>) -> Result<Call, ParseError> {
    let pos = locator.locate(pair.as_span().start());
    let mut inner = pair.into_inner();
    let name = match inner.next() {
        Some(ident) => ident.as_str().to_string(),
        None => return Err(unexpected(pos, "call without a name")),
    };
    let args = inner.map(|arg| build_term(arg, locator)).collect::<Result<Vec<_>, _>>()?;
    Ok(Call { name, args, pos })
}

fn string_contents(pair: Pair<'_, Rule>, locator: &mut Locator<'_>) -> Result<String, ParseError> {
    let pos = locator.locate(pair.as_span().start());
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    unescape(raw).map_err(|msg| unexpected(pos, &msg))
}

// ————————————————————————————————————————————————————————————————————————————
// NESTING GUARD
// ————————————————————————————————————————————————————————————————————————————

/// Reject input whose bracket nesting exceeds `limit` before the (recursive)
/// grammar ever sees it. Brackets inside strings, comments and regex literals
/// don't count.
pub fn check_nesting(text: &str, limit: usize) -> Result<(), ParseError> {
    let mut depth = 0usize;
    let (mut line, mut column) = (1usize, 0usize);
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' { line += 1; column = 0; } else { column += 1; }

        if let Some(q) = quote {
            match c {
                '\\' => {
                    if chars.next() == Some('\n') { line += 1; column = 0; } else { column += 1; }
                }
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' { break; }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                column += 1;
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if n == '\n' { line += 1; column = 0; } else { column += 1; }
                    if prev == '*' && n == '/' { break; }
                    prev = n;
                }
            }
            // regex literal; the grammar has no division operator
            '/' => loop {
                let Some(n) = chars.next() else { break };
                if n == '\n' { line += 1; column = 0; break; }
                column += 1;
                match n {
                    '\\' => match chars.next() {
                        Some('\n') => { line += 1; column = 0; }
                        Some(_) => column += 1,
                        None => break,
                    },
                    '/' => break,
                    _ => {}
                }
            },
            '(' | '[' | '{' => {
                depth += 1;
                if depth > limit {
                    return Err(ParseError::TooDeep { limit, line, column });
                }
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Byte offset → 1-based line and column (in chars).
///
/// The syntax tree is built in source order, so lookups mostly ascend; each
/// one counts forward from the previous answer when it is on the same line,
/// which keeps a long single-line chain linear.
struct Locator<'t> {
    text: &'t str,
    line_starts: Vec<usize>,
    last: (usize, Pos),
}

impl<'t> Locator<'t> {
    fn new(text: &'t str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts, last: (0, Pos { line: 1, column: 1 }) }
    }

    fn locate(&mut self, offset: usize) -> Pos {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let (last_offset, last_pos) = self.last;
        let (from, column) = if last_pos.line == line && last_offset <= offset {
            (last_offset, last_pos.column)
        } else {
            (self.line_starts[line - 1], 1)
        };
        let pos = Pos { line, column: column + self.text[from..offset].chars().count() };
        self.last = (offset, pos);
        pos
    }
}

fn unexpected(pos: Pos, message: &str) -> ParseError {
    ParseError::Syntax { line: pos.line, column: pos.column, message: message.to_string() }
}

fn syntax_error(error: pest::error::Error<Rule>) -> ParseError {
    let error = error.renamed_rules(|rule| match rule {
        Rule::chain => "schema (z.…)".into(),
        Rule::call => "method call".into(),
        Rule::binding => "declaration".into(),
        Rule::EOI => "end of input".into(),
        other => format!("{other:?}"),
    });
    let (line, column) = match error.line_col {
        LineColLocation::Pos(p) => p,
        LineColLocation::Span(p, _) => p,
    };
    ParseError::Syntax { line, column, message: error.variant.message().into_owned() }
}

/// JS string escapes, minus the legacy octal forms.
fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('\n') => {} // line continuation
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(code_point(&hex)?);
            }
            Some('u') => {
                let rest = chars.as_str();
                let hex = if let Some(braced) = rest.strip_prefix('{') {
                    let end = braced.find('}').ok_or("unterminated \\u{…} escape")?;
                    let hex = braced[..end].to_string();
                    chars = braced[end + 1..].chars();
                    hex
                } else {
                    chars.by_ref().take(4).collect()
                };
                out.push(code_point(&hex)?);
            }
            Some(other) => out.push(other),
            None => return Err("dangling backslash".into()),
        }
    }
    Ok(out)
}

fn code_point(hex: &str) -> Result<char, String> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid escape code `{hex}`"))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
