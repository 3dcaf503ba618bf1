use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::git::{self, CommitIdentity};
use crate::manifest::{PatchEntry, PatchManifest};
use crate::utils::parser;

use super::Pipeline;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutput {
    pub applied: Vec<PatchEntry>,
}

/// Apply and commit each manifest entry in declaration order. The first
/// failing patch aborts the stage; earlier commits stay in place.
pub fn patch(pipeline: &Pipeline, target: &Path) -> Result<PatchOutput> {
    let settings = &pipeline.settings.patches;
    let manifest_path = parser::resolve_path(&pipeline.base_dir, &settings.manifest);
    let manifest = PatchManifest::load(&manifest_path)?;

    let repo = pipeline.checkout_dir(target);
    let identity = CommitIdentity {
        name: settings.author_name.clone(),
        email: settings.author_email.clone(),
    };

    let mut applied = Vec::with_capacity(manifest.entries.len());
    for entry in &manifest.entries {
        log_status!("patch", "Applying {}", entry.file);
        git::apply(pipeline.runner, &repo, &manifest.patch_path(entry))?;
        git::commit_all(pipeline.runner, &repo, &entry.message, &identity)?;
        applied.push(entry.clone());
    }

    Ok(PatchOutput { applied })
}
