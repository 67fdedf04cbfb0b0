//! Minimal CLI: schema source → descriptor JSON (convert) or parse-only (check)
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::convert::{self, InputFormat, Options, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NESTING};
use crate::descriptor::Descriptor;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// translate validation schemas (DSL text or tagged JSON) into JSON-schema-ish descriptors
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more log output on stderr (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// translate and print the descriptor(s)
    Convert(ConvertOut),
    /// only build the schema node(s); report problems without translating
    Check(CheckOut),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SourceFormat {
    /// builder-chain source, e.g. `z.object({ id: z.string() })`
    #[default]
    Dsl,
    /// tagged JSON nodes, e.g. `{"kind": "string"}`
    Json,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// how to read each input
    #[arg(long, value_enum, default_value_t = SourceFormat::Dsl)]
    from: SourceFormat,

    /// JSON Pointer to select a subnode in each document (json input only)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document (json input only)
    #[arg(long)]
    jq_expr: Option<String>,

    /// deepest schema nesting the translator accepts
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// deepest bracket nesting the DSL parser accepts
    #[arg(long, default_value_t = DEFAULT_MAX_NESTING)]
    max_nesting: usize,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct ConvertOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted); left untouched on failure
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl From<SourceFormat> for InputFormat {
    fn from(format: SourceFormat) -> Self {
        match format {
            SourceFormat::Dsl => InputFormat::Dsl,
            SourceFormat::Json => InputFormat::Json,
        }
    }
}

impl InputSource {
    fn label(&self) -> String {
        match self {
            InputSource::Stdin => "-".to_string(),
            InputSource::File(path) => path.to_string_lossy().to_string(),
        }
    }

    fn read(&self) -> Result<String> {
        match self {
            InputSource::Stdin => std::io::read_to_string(std::io::stdin()).context("failed to read stdin"),
            InputSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read source file {}", path.display())),
        }
    }
}

impl InputSettings {
    fn options(&self) -> Options {
        Options {
            format: self.from.into(),
            max_depth: self.max_depth,
            max_nesting: self.max_nesting,
            json_pointer: self.json_pointer.clone(),
            jq_expr: self.jq_expr.clone(),
        }
    }

    /// Run `apply` over every input in parallel; results keep input order.
    fn load_process<T, F>(&self, apply: F) -> Result<Vec<(String, Result<T>)>>
    where
        T: Send,
        F: Fn(&str, &Options) -> Result<T> + Sync,
    {
        if self.from == SourceFormat::Dsl && (self.json_pointer.is_some() || self.jq_expr.is_some()) {
            bail!("--json-pointer and --jq-expr only apply to `--from json`");
        }
        let sources = resolve_file_path_patterns(&self.input)?;
        let options = self.options();
        Ok(sources
            .par_iter()
            .map(|source| {
                let label = source.label();
                let outcome = source.read().and_then(|text| apply(&text, &options));
                (label, outcome)
            })
            .collect())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        };
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("zod_jsonschema={level}"))),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Convert(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let results = target.input_settings.load_process(|text, options| {
                    Ok(convert::convert_all(text, options)?)
                })?;
                let converted = collect_or_report(results)?;
                for (label, descriptors) in &converted {
                    let fallbacks = descriptors.iter().filter(|d| d.is_fallback()).count();
                    tracing::info!(input = %label, schemas = descriptors.len(), "converted");
                    if fallbacks > 0 {
                        tracing::info!(input = %label, fallbacks, "root schema has no descriptor; emitted {{\"type\":\"any\"}}");
                    }
                }

                let output = assemble_output(converted);
                let rendered = if target.compact {
                    serde_json::to_string(&output)?
                } else {
                    serde_json::to_string_pretty(&output)?
                };
                match target.out.as_ref() {
                    Some(out) => write_output(out, &rendered)?,
                    None => println!("{rendered}"),
                }
                Ok(())
            }
            Command::Check(target) => {
                let results = target.input_settings.load_process(|text, options| {
                    Ok(convert::load_nodes(text, options)?.len())
                })?;
                for (label, count) in collect_or_report(results)? {
                    println!("{} {label} ({count} schema{})", "ok".green(), if count == 1 { "" } else { "s" });
                }
                Ok(())
            }
        }
    }
}

/// `error: …` in red, with the anyhow context chain on one line.
pub fn render_error(error: &anyhow::Error) -> String {
    format!("{} {error:#}", "error:".red().bold())
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Every failure is reported; nothing is returned unless all inputs succeeded.
fn collect_or_report<T>(results: Vec<(String, Result<T>)>) -> Result<Vec<(String, T)>> {
    let total = results.len();
    let mut ok = Vec::with_capacity(total);
    let mut failed = 0usize;
    for (label, outcome) in results {
        match outcome {
            Ok(value) => ok.push((label, value)),
            Err(error) => {
                failed += 1;
                eprintln!("{} {}: {error:#}", "error:".red().bold(), label.bold());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {total} input(s) failed");
    }
    Ok(ok)
}

/// One input with one schema → that descriptor; several schemas → array;
/// several inputs → object keyed by input label.
fn assemble_output(converted: Vec<(String, Vec<Descriptor>)>) -> Value {
    fn one(mut descriptors: Vec<Descriptor>) -> Value {
        if descriptors.len() == 1 {
            descriptors.remove(0).to_value()
        } else {
            Value::Array(descriptors.iter().map(Descriptor::to_value).collect())
        }
    }

    if converted.len() == 1 {
        let (_, descriptors) = converted.into_iter().next().unwrap_or_default();
        return one(descriptors);
    }
    Value::Object(
        converted
            .into_iter()
            .map(|(label, descriptors)| (label, one(descriptors)))
            .collect(),
    )
}

fn write_output(out: &Path, rendered: &str) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, rendered).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<InputSource>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<InputSource>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if pattern == "-" {
            if out.contains(&InputSource::Stdin) {
                return Err(anyhow!("stdin ('-') given more than once"));
            }
            out.push(InputSource::Stdin);
        } else if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                matched_any = true;
                out.push(InputSource::File(entry?));
            }
            if !matched_any {
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
        } else {
            out.push(InputSource::File(PathBuf::from(pattern)));
        }
    }

    Ok(out)
}
