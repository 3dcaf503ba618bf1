use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::utils::io;
use crate::workspace::Workspace;

use super::build::{self, BuildOptions};
use super::{fetch, package, patch, Pipeline};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllOutput {
    pub version: String,
    pub archive: String,
    pub sidecar: String,
    pub digest: String,
    pub version_file: String,
}

/// Run get, patch, build and package inside a fresh workspace.
///
/// The workspace is removed on every path. A stage failure wins over a
/// cleanup failure; the version stamp is only written after both succeed.
pub fn all(pipeline: &Pipeline, options: &BuildOptions) -> Result<AllOutput> {
    let output = &pipeline.settings.output;
    let workspace = Workspace::create(&output.workspace_prefix, output.read_only)?;

    let staged = run_stages(pipeline, workspace.path(), options);
    let closed = workspace.close();
    let (version, packaged) = staged?;
    closed?;

    io::ensure_dir(&pipeline.output_dir, "create output directory")?;
    let version_file = pipeline.output_dir.join(&output.version_file);
    io::write_file(&version_file, &version, "write version file")?;
    log_status!("all", "Built {} ({})", version, packaged.archive);

    Ok(AllOutput {
        version,
        archive: packaged.archive,
        sidecar: packaged.sidecar,
        digest: packaged.digest,
        version_file: version_file.to_string_lossy().to_string(),
    })
}

fn run_stages(
    pipeline: &Pipeline,
    dir: &Path,
    options: &BuildOptions,
) -> Result<(String, package::PackageOutput)> {
    let fetched = fetch::get(pipeline, dir)?;
    patch::patch(pipeline, dir)?;
    build::build(pipeline, dir, options)?;
    let packaged = package::package(pipeline, dir, &fetched.version)?;
    Ok((fetched.version, packaged))
}
