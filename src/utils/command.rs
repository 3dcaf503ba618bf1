//! External program execution with consistent error handling.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result, ToolInvocationFailedDetails};
use crate::utils::shell;

/// A single invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Stream output to our stderr instead of capturing it. Used for
    /// long-running builds; stdout stays reserved for the JSON response.
    pub passthrough: bool,
}

impl ToolCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            passthrough: false,
        }
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    /// Shell-quoted rendering for logs and error details.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            return self.program.clone();
        }
        format!("{} {}", self.program, shell::quote_args(&self.args))
    }

    fn failure(&self, exit_code: i32, stderr: String) -> Error {
        Error::tool_invocation_failed(ToolInvocationFailedDetails {
            command: self.display(),
            exit_code,
            cwd: self.cwd.as_ref().map(|p| p.display().to_string()),
            stderr,
        })
    }
}

/// Runs external programs on behalf of the pipeline stages.
pub trait ToolRunner {
    /// Run the command to completion. Returns trimmed stdout (empty for
    /// passthrough commands) or a `tool.invocation_failed` error.
    fn run(&self, command: &ToolCommand) -> Result<String>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<String> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        if command.passthrough {
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::from(std::io::stderr()))
                .stderr(Stdio::inherit())
                .status()
                .map_err(|e| command.failure(-1, format!("Failed to start: {}", e)))?;

            if !status.success() {
                return Err(command.failure(status.code().unwrap_or(-1), String::new()));
            }
            return Ok(String::new());
        }

        let output = cmd
            .output()
            .map_err(|e| command.failure(-1, format!("Failed to start: {}", e)))?;

        if !output.status.success() {
            return Err(command.failure(output.status.code().unwrap_or(-1), error_text(&output)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}
