use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::{io, parser};

const MAJOR_PATTERN: &str = r"(?m)^\s*#\s*define\s+VIM_VERSION_MAJOR\s+(\d+)\b";
const MINOR_PATTERN: &str = r"(?m)^\s*#\s*define\s+VIM_VERSION_MINOR\s+(\d+)\b";
const NODOT_PATTERN: &str = r#"VIM_VERSION_NODOT\s*"(vim\d\d[^"]*)""#;

/// Strip exactly one leading `v` from a tag description ("v9.0.1" -> "9.0.1").
pub fn strip_version_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('v').unwrap_or(trimmed)
}

/// Runtime directory name (`vim90`) derived from the version header.
///
/// The numeric major/minor constants are preferred; the `VIM_VERSION_NODOT`
/// string literal is the fallback for headers that only carry that.
pub fn runtime_dir_name(header: &str) -> Option<String> {
    let major = parser::extract_first(header, MAJOR_PATTERN);
    let minor = parser::extract_first(header, MINOR_PATTERN);

    if let (Some(major), Some(minor)) = (major, minor) {
        return Some(format!("vim{}{}", major, minor));
    }

    parser::extract_first(header, NODOT_PATTERN)
}

pub fn read_runtime_dir(header_path: &Path) -> Result<String> {
    let content = io::read_file(header_path, "read version header")?;
    runtime_dir_name(&content).ok_or_else(|| {
        Error::package_header_invalid(
            header_path.display().to_string(),
            "no VIM_VERSION_MAJOR/VIM_VERSION_MINOR or VIM_VERSION_NODOT definition",
        )
    })
}
