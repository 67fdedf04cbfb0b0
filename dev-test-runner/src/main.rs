//! Replays `fixtures/cases.json` through the library and reports pass/fail.
//!
//! ```text
//! cargo run -p dev-test-runner                  # every case
//! cargo run -p dev-test-runner -- 'enum|array'  # cases whose name matches
//! cargo run -p dev-test-runner -- --manifest other.json
//! ```
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use zod_jsonschema::{convert_source, InputFormat, Options};

const DEFAULT_MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/cases.json");

/// `12:7` → `L:C`, so expected messages don't pin exact source positions.
static POSITION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+:\d+\b").expect("static regex"));

/// replay golden conversion cases and report pass/fail
#[derive(Parser, Debug)]
struct RunnerArgs {
    /// case manifest (JSON array of cases)
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    manifest: PathBuf,

    /// only run cases whose name matches this regex
    #[arg(value_parser = Regex::new)]
    filter: Option<Regex>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    source: String,
    #[serde(default)]
    format: Format,
    expect: Option<Value>,
    error: Option<String>,  // substring of the (position-normalized) message
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum Format {
    #[default]
    Dsl,
    Json,
}

enum Outcome {
    Pass,
    Fail(String),
}

fn main() -> ExitCode {
    let args = RunnerArgs::parse();

    let cases = match load_cases(&args.manifest) {
        Ok(cases) => cases,
        Err(message) => {
            eprintln!("{} {message}", "error:".red().bold());
            return ExitCode::from(2);
        }
    };

    let mut passed = 0usize;
    let mut failed = 0usize;
    for case in cases.iter().filter(|c| args.filter.as_ref().is_none_or(|re| re.is_match(&c.name))) {
        match run_case(case) {
            Outcome::Pass => {
                passed += 1;
                println!("{} {}", "PASS".green().bold(), case.name);
            }
            Outcome::Fail(reason) => {
                failed += 1;
                println!("{} {}\n     {reason}", "FAIL".red().bold(), case.name);
            }
        }
    }

    let summary = format!("{passed} passed, {failed} failed");
    if failed == 0 {
        println!("{}", summary.green());
        ExitCode::SUCCESS
    } else {
        println!("{}", summary.red());
        ExitCode::FAILURE
    }
}

fn load_cases(path: &Path) -> Result<Vec<Case>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(de)
        .map_err(|e| format!("{}: at {} → {}", path.display(), e.path(), e.inner()))
}

fn run_case(case: &Case) -> Outcome {
    let options = Options {
        format: match case.format {
            Format::Dsl => InputFormat::Dsl,
            Format::Json => InputFormat::Json,
        },
        ..Options::default()
    };
    match (convert_source(&case.source, &options), &case.expect, &case.error) {
        (Ok(got), Some(expect), None) => {
            let got = got.to_value();
            if &got == expect {
                Outcome::Pass
            } else {
                Outcome::Fail(format!("expected {expect}\n     got      {got}"))
            }
        }
        (Err(error), None, Some(expected)) => {
            let message = POSITION.replace_all(&error.to_string(), "L:C").into_owned();
            if message.contains(expected.as_str()) {
                Outcome::Pass
            } else {
                Outcome::Fail(format!("expected error containing `{expected}`, got `{message}`"))
            }
        }
        (Ok(got), None, Some(expected)) => {
            Outcome::Fail(format!("expected error containing `{expected}`, got {}", got.to_value()))
        }
        (Err(error), Some(_), None) => Outcome::Fail(format!("unexpected error: {error}")),
        _ => Outcome::Fail("case needs exactly one of `expect` or `error`".to_string()),
    }
}
