//! Version-control operations used by the fetch and patch stages.
//!
//! Everything goes through a [`ToolRunner`] so stages can be exercised
//! without a real git binary.

use std::path::Path;

use crate::error::Result;
use crate::utils::command::{ToolCommand, ToolRunner};

/// Optional author identity for patch commits. Empty means "use git's own
/// configuration".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CommitIdentity {
    fn config_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(name) = &self.name {
            args.push("-c".to_string());
            args.push(format!("user.name={}", name));
        }
        if let Some(email) = &self.email {
            args.push("-c".to_string());
            args.push(format!("user.email={}", email));
        }
        args
    }
}

/// `git clone <url> <dir>` run inside `parent`.
pub fn clone(runner: &dyn ToolRunner, url: &str, dir: &str, parent: &Path) -> Result<()> {
    log_status!("git", "Cloning {} into {}", url, parent.join(dir).display());
    runner.run(&ToolCommand::new("git", ["clone", url, dir]).in_dir(parent).passthrough())?;
    Ok(())
}

/// `git describe --tags` for the checkout.
pub fn describe_tags(runner: &dyn ToolRunner, repo: &Path) -> Result<String> {
    runner.run(&ToolCommand::new("git", ["describe", "--tags"]).in_dir(repo))
}

pub fn apply(runner: &dyn ToolRunner, repo: &Path, patch: &Path) -> Result<()> {
    let repo = repo.to_string_lossy().to_string();
    let patch = patch.to_string_lossy().to_string();
    runner.run(&ToolCommand::new("git", ["-C".to_string(), repo, "apply".to_string(), patch]))?;
    Ok(())
}

/// Commit every tracked modification (`commit -am`).
pub fn commit_all(
    runner: &dyn ToolRunner,
    repo: &Path,
    message: &str,
    identity: &CommitIdentity,
) -> Result<()> {
    let mut args = vec!["-C".to_string(), repo.to_string_lossy().to_string()];
    args.extend(identity.config_args());
    args.extend(["commit".to_string(), "-am".to_string(), message.to_string()]);

    runner.run(&ToolCommand::new("git", args))?;
    Ok(())
}
