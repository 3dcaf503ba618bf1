//! Python interpreter used for the dynamic `+python3` build and as the source
//! of the embeddable distribution bundled into the package.

use serde::Serialize;

use crate::defaults::PythonConfig;
use crate::error::{Error, Result};
use crate::utils::command::{ToolCommand, ToolRunner};
use crate::utils::parser;

const PROBE_SCRIPT: &str =
    "import sys; print(sys.prefix); print('%d.%d.%d' % tuple(sys.version_info[:3]))";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PythonInfo {
    pub prefix: String,
    /// Full `major.minor.micro` version.
    pub version: String,
}

impl PythonInfo {
    /// `PYTHON3_VER` form of the version: major and minor concatenated.
    pub fn short_version(&self) -> Result<String> {
        let (major, minor) = split_version(&self.version)?;
        Ok(format!("{}{}", major, minor))
    }

    /// Build tool variables enabling dynamically loaded Python 3.
    pub fn build_flags(&self) -> Result<Vec<String>> {
        Ok(vec![
            format!("PYTHON3=\"{}\"", self.prefix),
            "DYNAMIC_PYTHON3=yes".to_string(),
            format!("PYTHON3_VER={}", self.short_version()?),
        ])
    }
}

/// Configured values where present, interpreter probe for the rest.
pub fn resolve(config: &PythonConfig, runner: &dyn ToolRunner) -> Result<PythonInfo> {
    if let (Some(prefix), Some(version)) = (&config.prefix, &config.version) {
        split_version(version)?;
        return Ok(PythonInfo {
            prefix: prefix.clone(),
            version: version.clone(),
        });
    }

    let probed = probe(runner, &config.executable)?;
    let info = PythonInfo {
        prefix: config.prefix.clone().unwrap_or(probed.prefix),
        version: config.version.clone().unwrap_or(probed.version),
    };
    split_version(&info.version)?;
    Ok(info)
}

/// Ask the interpreter for its prefix and version.
pub fn probe(runner: &dyn ToolRunner, executable: &str) -> Result<PythonInfo> {
    log_status!("python", "Probing {}", executable);
    let output = runner.run(&ToolCommand::new(executable, ["-c", PROBE_SCRIPT]))?;

    let mut lines = parser::lines(&output);
    match (lines.next(), lines.next()) {
        (Some(prefix), Some(version)) => Ok(PythonInfo {
            prefix: prefix.to_string(),
            version: version.to_string(),
        }),
        _ => Err(Error::internal_unexpected(format!(
            "Unexpected output from {} probe: {:?}",
            executable, output
        ))),
    }
}

/// Substitute the interpreter version into the embeddable archive URL.
pub fn embed_url(template: &str, version: &str) -> String {
    template.replace("{version}", version)
}

fn split_version(version: &str) -> Result<(&str, &str)> {
    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor))
            if is_number(major) && is_number(minor) && parts.all(is_number) =>
        {
            Ok((major, minor))
        }
        _ => Err(Error::config_invalid_value(
            "python.version",
            Some(version.to_string()),
            "expected a dotted numeric version such as 3.11.4",
        )),
    }
}

fn is_number(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}
