//! Discovery of the native build environment initializer (`vcvarsall.bat`).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::defaults::ToolchainConfig;
use crate::error::{Error, Result};

/// Locate the initializer script.
///
/// An explicitly configured path wins when it exists. Otherwise candidates are
/// tried in order; the first pattern with any match yields its greatest match,
/// comparing digit runs as numbers, which for versioned install roots is the
/// newest toolchain.
pub fn resolve_initializer(config: &ToolchainConfig) -> Result<PathBuf> {
    let mut tried = Vec::new();

    if let Some(explicit) = &config.initializer {
        let path = PathBuf::from(expand(explicit).unwrap_or_else(|| explicit.clone()));
        if path.is_file() {
            log_status!("toolchain", "Using configured {}", path.display());
            return Ok(path);
        }
        tried.push(explicit.clone());
    }

    for candidate in &config.candidates {
        tried.push(candidate.clone());

        let Some(pattern) = expand(candidate) else {
            continue;
        };
        if let Some(found) = newest_match(&pattern) {
            log_status!("toolchain", "Found {}", found.display());
            return Ok(found);
        }
    }

    Err(Error::toolchain_not_found(tried))
}

/// Expand `~`, `$VAR` and `${VAR}`. A reference to an unset variable makes the
/// candidate unusable.
fn expand(pattern: &str) -> Option<String> {
    shellexpand::full(pattern).ok().map(|s| s.into_owned())
}

fn newest_match(pattern: &str) -> Option<PathBuf> {
    let paths = glob::glob(pattern).ok()?;
    paths
        .flatten()
        .filter(|path| path.is_file())
        .max_by(|a, b| compare_versioned(a, b))
}

/// A run of digits (leading zeros stripped) or of non-digits within a path
/// component.
#[derive(Debug, PartialEq, Eq)]
enum Run<'s> {
    Number(&'s str),
    Text(String),
}

impl Ord for Run<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Run::Number(a), Run::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Run::Text(a), Run::Text(b)) => a.cmp(b),
            (Run::Number(_), Run::Text(_)) => Ordering::Greater,
            (Run::Text(_), Run::Number(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Run<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn runs(component: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut rest = component;

    while let Some(first) = rest.chars().next() {
        let digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        runs.push(if digit {
            Run::Number(head.trim_start_matches('0'))
        } else {
            Run::Text(head.to_ascii_lowercase())
        });
        rest = tail;
    }
    runs
}

/// Order paths component by component, comparing digit runs numerically so
/// `Microsoft Visual Studio/18` sorts above `.../2022` and `14.0` above `9.0`.
fn compare_versioned(a: &Path, b: &Path) -> Ordering {
    let mut left = a.components();
    let mut right = b.components();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let x = x.as_os_str().to_string_lossy();
                let y = y.as_os_str().to_string_lossy();
                let order = runs(&x).cmp(&runs(&y));
                if order != Ordering::Equal {
                    return order;
                }
            }
        }
    }
}

/// Directory containing the initializer, for diagnostics.
pub fn install_root(initializer: &Path) -> Option<&Path> {
    initializer
        .ancestors()
        .find(|p| {
            p.file_name()
                .map(|name| name.eq_ignore_ascii_case("VC"))
                .unwrap_or(false)
        })
        .and_then(Path::parent)
}
