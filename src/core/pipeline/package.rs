//! Package stage: zip the built binaries, the runtime tree and the embeddable
//! Python distribution under one runtime directory, then write a SHA-256
//! sidecar next to the archive.

use glob::Pattern;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::python;
use crate::utils::io;
use crate::version;

use super::Pipeline;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutput {
    pub archive: String,
    pub sidecar: String,
    pub digest: String,
    pub runtime_dir: String,
    pub entries: usize,
}

fn zip_error(e: impl std::fmt::Display, archive: &Path) -> Error {
    Error::internal_io(
        e.to_string(),
        Some(format!("write archive {}", archive.display())),
    )
}

/// Write `<archive_prefix>-<version>.zip` and its `.sha256` sidecar into the
/// output directory.
///
/// Every entry lives below the runtime directory named by the checkout's
/// version header (for example `vim91/`):
///
/// ```text
/// vim91/vim.exe, vim91/gvim.exe, ...   built binaries
/// vim91/doc/..., vim91/syntax/...      runtime tree
/// vim91/python/...                     embeddable Python
/// ```
///
/// Older Vim-for-Windows zips put the binaries at the archive root and Python
/// under a top-level `python/`. Here installers unpack a single directory.
pub fn package(pipeline: &Pipeline, target: &Path, version: &str) -> Result<PackageOutput> {
    let settings = pipeline.settings;
    let checkout = pipeline.checkout_dir(target);
    let runtime_dir = version::read_runtime_dir(&checkout.join(&settings.package.header))?;

    // Fetch first so a network failure leaves no partial archive behind.
    let python = python::resolve(&settings.python, pipeline.runner)?;
    let embed_url = python::embed_url(&settings.python.embed_url, &python.version);
    let embed = pipeline.fetcher.fetch(&embed_url)?;

    io::ensure_dir(&pipeline.output_dir, "create output directory")?;
    let archive_path = pipeline.output_dir.join(format!(
        "{}-{}.zip",
        settings.package.archive_prefix, version
    ));
    log_status!("package", "Writing {}", archive_path.display());

    let mut writer = ArchiveWriter::create(&archive_path)?;

    let src = checkout.join("src");
    for binary in &settings.package.binaries {
        let data = io::read_bytes(&src.join(&binary.src), "read built binary")?;
        writer.add(&format!("{}/{}", runtime_dir, binary.name), &data)?;
    }

    let runtime = checkout.join(&settings.package.runtime);
    for (relative, path) in runtime_files(&runtime)? {
        let data = io::read_bytes(&path, "read runtime file")?;
        writer.add(&format!("{}/{}", runtime_dir, relative), &data)?;
    }

    let python_prefix = format!("{}/{}", runtime_dir, settings.python.archive_dir);
    writer.merge(&embed, &python_prefix, &embed_url)?;

    let entries = writer.finish()?;

    let digest = sha256_file(&archive_path)?;
    let sidecar = sidecar_path(&archive_path);
    std::fs::write(&sidecar, digest.as_bytes()).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("write {}", sidecar.display())))
    })?;
    log_status!("package", "SHA256 {}", digest);

    Ok(PackageOutput {
        archive: archive_path.to_string_lossy().to_string(),
        sidecar: sidecar.to_string_lossy().to_string(),
        digest,
        runtime_dir,
        entries,
    })
}

/// Zip writer staged in a temporary file next to the final archive. The
/// archive only appears under its real name once `finish` succeeds; an
/// abandoned writer removes its staging file.
struct ArchiveWriter<'p> {
    zip: ZipWriter<NamedTempFile>,
    options: FileOptions,
    path: &'p Path,
    entries: usize,
}

impl<'p> ArchiveWriter<'p> {
    fn create(path: &'p Path) -> Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file = tempfile::Builder::new()
            .prefix(".vimbuild-")
            .suffix(".zip.part")
            .tempfile_in(dir)
            .map_err(|e| zip_error(e, path))?;
        Ok(Self {
            zip: ZipWriter::new(file),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
            path,
            entries: 0,
        })
    }

    fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.zip
            .start_file(name, self.options)
            .map_err(|e| zip_error(e, self.path))?;
        self.zip
            .write_all(data)
            .map_err(|e| zip_error(e, self.path))?;
        self.entries += 1;
        Ok(())
    }

    /// Copy every file entry of another zip under `prefix`.
    fn merge(&mut self, bytes: &[u8], prefix: &str, origin: &str) -> Result<()> {
        let mut source = ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("open archive from {}", origin)))
        })?;

        for index in 0..source.len() {
            let mut entry = source.by_index(index).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("read archive from {}", origin)))
            })?;
            if entry.is_dir() {
                continue;
            }

            let name = format!("{}/{}", prefix, entry.name());
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("read {} from {}", name, origin)))
            })?;
            drop(entry);

            self.add(&name, &data)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<usize> {
        let staged = self.zip.finish().map_err(|e| zip_error(e, self.path))?;
        staged
            .persist(self.path)
            .map_err(|e| zip_error(e, self.path))?;
        Ok(self.entries)
    }
}

/// Files below `root` as (`/`-separated relative name, path), sorted.
fn runtime_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !root.is_dir() {
        return Err(Error::internal_io(
            "runtime directory not found",
            Some(root.display().to_string()),
        ));
    }

    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));
    let paths = glob::glob(&pattern)
        .map_err(|e| Error::internal_unexpected(format!("Invalid runtime pattern: {}", e)))?;

    let mut files = Vec::new();
    for path in paths {
        let path = path.map_err(|e| {
            Error::internal_io(e.to_string(), Some("walk runtime directory".to_string()))
        })?;
        if !path.is_file() {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, path));
    }

    files.sort();
    Ok(files)
}

/// Lowercase hex SHA-256 of a file's bytes.
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = io::read_bytes(path, "hash archive")?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// `<archive>.sha256`
pub fn sidecar_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".sha256");
    PathBuf::from(name)
}
