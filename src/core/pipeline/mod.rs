//! Pipeline stages and the command registry that exposes them.
//!
//! Each stage is a plain function over a [`Pipeline`] context, wrapped by a
//! registry handler that turns bound arguments into typed options and the
//! stage result into JSON.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::defaults::Settings;
use crate::dispatch::{BoundArgs, Command, Registry};
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::utils::command::ToolRunner;
use crate::utils::parser;

pub mod aggregate;
pub mod build;
pub mod fetch;
pub mod package;
pub mod patch;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::AllOutput;
pub use build::{BuildOptions, BuildOutput};
pub use fetch::FetchOutput;
pub use package::PackageOutput;
pub use patch::PatchOutput;

/// Shared context for every stage of one process run.
pub struct Pipeline<'a> {
    pub settings: &'a Settings,
    pub runner: &'a dyn ToolRunner,
    pub fetcher: &'a dyn Fetcher,
    /// Directory the patch manifest and the Lua installation resolve against.
    pub base_dir: PathBuf,
    /// Directory receiving the archive, its sidecar and the version stamp.
    pub output_dir: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn ToolRunner,
        fetcher: &'a dyn Fetcher,
        base_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            settings,
            runner,
            fetcher,
            base_dir,
            output_dir,
        }
    }

    /// Resolve a `target` argument against the base directory.
    pub fn target_dir(&self, target: &str) -> PathBuf {
        parser::resolve_path(&self.base_dir, target)
    }

    /// The source checkout inside a target directory.
    pub fn checkout_dir(&self, target: &Path) -> PathBuf {
        target.join(&self.settings.source.dir)
    }
}

/// Registry with `get`, `patch`, `build`, `package` and `all`.
pub fn registry<'a>() -> Result<Registry<Pipeline<'a>>> {
    let mut registry = Registry::new();

    registry.register(
        Command::new("get", "Clone the source and report its version", run_get)
            .param("target", "."),
    )?;
    registry.register(
        Command::new("patch", "Apply and commit the manifest's patches", run_patch)
            .param("target", "."),
    )?;
    registry.register(
        Command::new("build", "Generate and run the build script", run_build)
            .param("target", ".")
            .param("python", true)
            .param("lua", true)
            .param("make", ""),
    )?;
    registry.register(
        Command::new("package", "Write the zip archive and its SHA-256 sidecar", run_package)
            .param("target", ".")
            .param("version", "unknown"),
    )?;
    registry.register(
        Command::new("all", "Run every stage in a temporary workspace", run_all)
            .param("python", true)
            .param("lua", true)
            .param("make", ""),
    )?;

    Ok(registry)
}

fn to_json<T: Serialize>(output: T) -> Result<Value> {
    serde_json::to_value(output)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize stage output".to_string())))
}

fn build_options(args: &BoundArgs) -> Result<BuildOptions> {
    Ok(BuildOptions {
        python: args.flag("python")?,
        lua: args.flag("lua")?,
        make: args.str("make")?.to_string(),
    })
}

fn run_get(pipeline: &Pipeline, args: &BoundArgs) -> Result<Value> {
    let target = pipeline.target_dir(args.str("target")?);
    to_json(fetch::get(pipeline, &target)?)
}

fn run_patch(pipeline: &Pipeline, args: &BoundArgs) -> Result<Value> {
    let target = pipeline.target_dir(args.str("target")?);
    to_json(patch::patch(pipeline, &target)?)
}

fn run_build(pipeline: &Pipeline, args: &BoundArgs) -> Result<Value> {
    let target = pipeline.target_dir(args.str("target")?);
    to_json(build::build(pipeline, &target, &build_options(args)?)?)
}

fn run_package(pipeline: &Pipeline, args: &BoundArgs) -> Result<Value> {
    let target = pipeline.target_dir(args.str("target")?);
    to_json(package::package(pipeline, &target, args.str("version")?)?)
}

fn run_all(pipeline: &Pipeline, args: &BoundArgs) -> Result<Value> {
    to_json(aggregate::all(pipeline, &build_options(args)?)?)
}
