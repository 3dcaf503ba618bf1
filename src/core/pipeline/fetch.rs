use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::git;
use crate::version;

use super::Pipeline;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutput {
    pub version: String,
    pub source: String,
}

/// Clone the configured source into `target` and describe its newest tag.
pub fn get(pipeline: &Pipeline, target: &Path) -> Result<FetchOutput> {
    let source = &pipeline.settings.source;
    git::clone(pipeline.runner, &source.url, &source.dir, target)?;

    let checkout = pipeline.checkout_dir(target);
    let described = git::describe_tags(pipeline.runner, &checkout)?;
    let version = version::strip_version_prefix(&described).to_string();

    log_status!("get", "Version {}", version);
    Ok(FetchOutput {
        version,
        source: checkout.to_string_lossy().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeFetcher, FakeRunner, Fixture};

    #[test]
    fn clones_then_describes_checkout() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let fetcher = FakeFetcher::default();
        let target = fixture.target();

        let output = get(&fixture.pipeline(&runner, &fetcher), &target).unwrap();

        assert_eq!(output.version, "9.0.1234");
        let calls = runner.calls.borrow();
        assert_eq!(calls[0].args, vec!["clone", "https://github.com/vim/vim.git", "vim"]);
        assert_eq!(calls[0].cwd.as_deref(), Some(target.as_path()));
        assert_eq!(calls[1].args, vec!["describe", "--tags"]);
        assert_eq!(calls[1].cwd, Some(target.join("vim")));
    }

    #[test]
    fn version_without_prefix_is_kept() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        *runner.describe.borrow_mut() = "9.1.0001".to_string();
        let fetcher = FakeFetcher::default();

        let output = get(&fixture.pipeline(&runner, &fetcher), &fixture.target()).unwrap();
        assert_eq!(output.version, "9.1.0001");
    }

    #[test]
    fn clone_failure_is_fatal() {
        let fixture = Fixture::new();
        let runner = FakeRunner::failing("git", 128);
        let fetcher = FakeFetcher::default();

        let err = get(&fixture.pipeline(&runner, &fetcher), &fixture.target()).unwrap_err();
        assert_eq!(err.tool_exit_code(), Some(128));
        assert_eq!(runner.calls.borrow().len(), 1);
    }
}
