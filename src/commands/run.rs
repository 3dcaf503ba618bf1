use serde::Serialize;
use std::path::PathBuf;

use vimbuild::command::{SystemRunner, ToolRunner};
use vimbuild::defaults::{self, Settings};
use vimbuild::dispatch::{Registry, RunOutcome};
use vimbuild::http::{Fetcher, HttpFetcher};
use vimbuild::pipeline::{self, Pipeline};
use vimbuild::Error;

use super::{CmdResult, GlobalArgs};
use crate::tty;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub runs: Vec<RunOutcome>,
}

/// Load settings, build the registry and dispatch `tokens`.
pub fn run(tokens: Vec<String>, global: &GlobalArgs) -> CmdResult<RunReport> {
    let settings = defaults::load_settings(global.config.as_deref())?;
    let fetcher = HttpFetcher::new(settings.python.fetch_timeout_secs)?;
    dispatch(&settings, &SystemRunner, &fetcher, tokens, global)
}

pub fn dispatch(
    settings: &Settings,
    runner: &dyn ToolRunner,
    fetcher: &dyn Fetcher,
    tokens: Vec<String>,
    global: &GlobalArgs,
) -> CmdResult<RunReport> {
    let cwd = std::env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("resolve current directory".to_string())))?;
    let base_dir = global.base_dir.clone().unwrap_or_else(|| cwd.clone());
    let output_dir = global.output_dir.clone().unwrap_or(cwd);

    let registry = pipeline::registry()?;
    let tokens: Vec<String> = std::iter::once(env!("CARGO_PKG_NAME").to_string())
        .chain(tokens)
        .collect();
    require_command(&registry, &tokens)?;

    tty::status(&format!("vimbuild {}", tokens[1..].join(" ")));

    let ctx = Pipeline::new(settings, runner, fetcher, base_dir, output_dir);
    let runs = registry.parse_and_run(&ctx, &tokens)?;
    Ok((RunReport { runs }, 0))
}

fn require_command<C>(registry: &Registry<C>, tokens: &[String]) -> vimbuild::Result<()> {
    if registry.runs(tokens).next().is_some() {
        return Ok(());
    }
    let names: Vec<&str> = registry.commands().map(|c| c.name()).collect();
    Err(Error::validation_missing_argument(vec!["command".to_string()])
        .with_hint(format!("Available commands: {}", names.join(", "))))
}
