//! Patch manifest: an INI file whose `[patches]` section lists patch files in
//! the order they must be applied.
//!
//! ```ini
//! [patches]
//! fix-a.patch = Inline commit message
//! fix-b.patch
//!
//! [fix-b.patch]
//! message = Message supplied by a per-patch section
//! ```
//!
//! A `message` in a per-patch section takes precedence over the inline value;
//! the inline value is the fallback. Indented lines continue the previous
//! value, joined with newlines, for multi-line commit messages:
//!
//! ```ini
//! [fix-c.patch]
//! message = Subject line
//!     Body text that follows the subject.
//! ```
//!
//! Keys keep their case. `;` and `#` start comment lines.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::{io, parser};

const PATCHES_SECTION: &str = "patches";
const MESSAGE_KEY: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchEntry {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PatchManifest {
    /// Directory patch files are resolved against.
    pub dir: PathBuf,
    pub entries: Vec<PatchEntry>,
}

impl PatchManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = io::read_file(path, "read patch manifest")?;
        let entries = parse(&content, &path.display().to_string())?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self { dir, entries })
    }

    pub fn patch_path(&self, entry: &PatchEntry) -> PathBuf {
        parser::resolve_path(&self.dir, &entry.file)
    }
}

struct Item {
    key: String,
    value: Option<String>,
    line: usize,
}

struct Section {
    name: String,
    items: Vec<Item>,
}

impl Section {
    fn get(&self, key: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.key == key)
    }
}

/// Parse manifest text into entries, in declaration order.
pub fn parse(content: &str, origin: &str) -> Result<Vec<PatchEntry>> {
    let sections = parse_sections(content, origin)?;

    let patches = sections
        .iter()
        .find(|s| s.name == PATCHES_SECTION)
        .ok_or_else(|| Error::manifest_invalid(origin, "missing [patches] section", None))?;

    patches
        .items
        .iter()
        .map(|item| {
            let inline = item.value.as_deref().filter(|v| !v.is_empty());
            let from_section = || {
                sections
                    .iter()
                    .find(|s| s.name == item.key)
                    .and_then(|s| s.get(MESSAGE_KEY))
                    .and_then(|m| m.value.as_deref())
                    .filter(|v| !v.is_empty())
            };

            let message = from_section().or(inline).ok_or_else(|| {
                Error::manifest_invalid(
                    origin,
                    format!("patch '{}' has no commit message", item.key),
                    Some(item.line),
                )
            })?;

            Ok(PatchEntry {
                file: item.key.clone(),
                message: message.to_string(),
            })
        })
        .collect()
}

fn parse_sections(content: &str, origin: &str) -> Result<Vec<Section>> {
    let mut sections: Vec<Section> = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if raw.starts_with(char::is_whitespace) {
            let open_value = sections
                .last_mut()
                .and_then(|s| s.items.last_mut())
                .and_then(|item| item.value.as_mut());
            if let Some(value) = open_value {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(line);
                continue;
            }
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    Error::manifest_invalid(origin, "malformed section header", Some(line_no))
                })?;

            if sections.iter().any(|s| s.name == name) {
                return Err(Error::manifest_invalid(
                    origin,
                    format!("duplicate section [{}]", name),
                    Some(line_no),
                ));
            }
            sections.push(Section {
                name: name.to_string(),
                items: Vec::new(),
            });
            continue;
        }

        let section = sections.last_mut().ok_or_else(|| {
            Error::manifest_invalid(origin, "entry outside of any section", Some(line_no))
        })?;

        let (key, value) = match line.find(['=', ':']) {
            Some(pos) => (line[..pos].trim(), Some(line[pos + 1..].trim().to_string())),
            None => (line, None),
        };

        if key.is_empty() {
            return Err(Error::manifest_invalid(origin, "empty key", Some(line_no)));
        }
        if section.get(key).is_some() {
            return Err(Error::manifest_invalid(
                origin,
                format!("duplicate key '{}' in [{}]", key, section.name),
                Some(line_no),
            ));
        }

        section.items.push(Item {
            key: key.to_string(),
            value,
            line: line_no,
        });
    }

    Ok(sections)
}
