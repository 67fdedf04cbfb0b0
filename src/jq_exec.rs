//! jq pre-selection for encoded node documents.
//!
//! A document may hold many schemas (`{"user": {...}, "post": {...}}`); a jq
//! program such as `.user` or `.[]` picks the node(s) to convert.
use std::fmt::Debug;

use anyhow::{anyhow, Context, Result};
use jaq_core::{load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

/// Run `filter_src` over `input`; every output becomes one candidate node.
pub fn select_nodes(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader
        .load(&arena, program)
        .map_err(|errs| rejected(filter_src, "does not parse", errs.into_iter().map(|(_, e)| e)))?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| rejected(filter_src, "uses undefined names", errs.into_iter().flat_map(|(_, names)| names)))?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for (index, item) in outputs.enumerate() {
        let val = item.map_err(|e| anyhow!("node selector `{filter_src}` failed: {e:?}"))?;
        // Val: Display -> JSON text
        let node = serde_json::from_str::<Value>(&val.to_string())
            .with_context(|| format!("jq output #{index} is not JSON"))?;
        out.push(node);
    }
    tracing::debug!(filter = filter_src, selected = out.len(), "jq selection done");
    Ok(out)
}

/// One error naming the selection program, with every problem jaq reported.
fn rejected<P: Debug>(filter_src: &str, what: &str, problems: impl IntoIterator<Item = P>) -> anyhow::Error {
    let problems: Vec<String> = problems.into_iter().map(|p| format!("{p:?}")).collect();
    anyhow!("node selector `{filter_src}` {what}: {}", problems.join("; "))
}
