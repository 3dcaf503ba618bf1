//! Fakes and fixtures shared by the stage tests.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::defaults::Settings;
use crate::error::{Error, Result, ToolInvocationFailedDetails};
use crate::http::Fetcher;
use crate::utils::command::{ToolCommand, ToolRunner};

use super::Pipeline;

pub const HEADER: &str = "#define VIM_VERSION_MAJOR\t\t 9\n#define VIM_VERSION_MINOR\t\t 0\n#define VIM_VERSION_NODOT\t\"vim90\"\n";

/// Lay out what a built checkout looks like to the package stage.
pub fn seed_checkout(checkout: &Path) {
    let src = checkout.join("src");
    fs::create_dir_all(src.join("xxd")).unwrap();
    fs::create_dir_all(src.join("GvimExt")).unwrap();
    fs::create_dir_all(checkout.join("runtime/doc")).unwrap();

    fs::write(src.join("version.h"), HEADER).unwrap();
    for bin in ["vim.exe", "gvim.exe", "vimrun.exe", "xxd/xxd.exe", "GvimExt/gvimext.dll"] {
        fs::write(src.join(bin), format!("binary {}", bin)).unwrap();
    }
    fs::write(checkout.join("runtime/vimrc_example.vim"), "set nocompatible\n").unwrap();
    fs::write(checkout.join("runtime/doc/help.txt"), "*help.txt*\n").unwrap();
}

/// Records every command. `git clone` seeds a checkout in its working
/// directory; a failure can be injected for one program.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: RefCell<Vec<ToolCommand>>,
    pub describe: RefCell<String>,
    pub fail_program: RefCell<Option<(String, i32)>>,
}

impl FakeRunner {
    pub fn failing(program: &str, exit_code: i32) -> Self {
        let runner = Self::default();
        *runner.fail_program.borrow_mut() = Some((program.to_string(), exit_code));
        runner
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    pub fn clone_dir(&self) -> Option<PathBuf> {
        self.calls
            .borrow()
            .iter()
            .find(|c| c.program == "git" && c.args.first().map(String::as_str) == Some("clone"))
            .and_then(|c| c.cwd.clone())
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, command: &ToolCommand) -> Result<String> {
        self.calls.borrow_mut().push(command.clone());

        if let Some((program, exit_code)) = self.fail_program.borrow().as_ref() {
            if &command.program == program {
                return Err(Error::tool_invocation_failed(ToolInvocationFailedDetails {
                    command: command.display(),
                    exit_code: *exit_code,
                    cwd: None,
                    stderr: "injected failure".to_string(),
                }));
            }
        }

        match (command.program.as_str(), command.args.first().map(String::as_str)) {
            ("git", Some("clone")) => {
                let cwd = command.cwd.clone().unwrap_or_default();
                seed_checkout(&cwd.join(&command.args[2]));
                Ok(String::new())
            }
            ("git", Some("describe")) => {
                let describe = self.describe.borrow();
                Ok(if describe.is_empty() {
                    "v9.0.1234".to_string()
                } else {
                    describe.clone()
                })
            }
            ("python", _) => Ok("C:\\Python311\n3.11.4".to_string()),
            _ => Ok(String::new()),
        }
    }
}

/// Serves an in-memory embeddable Python zip.
#[derive(Default)]
pub struct FakeFetcher {
    pub urls: RefCell<Vec<String>>,
    pub fail: Cell<bool>,
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.urls.borrow_mut().push(url.to_string());
        if self.fail.get() {
            return Err(Error::network_fetch_failed(url, "connection refused", None));
        }
        Ok(embed_zip())
    }
}

pub fn embed_zip() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();

    zip.add_directory("Lib/", options).unwrap();
    zip.start_file("python.exe", options).unwrap();
    zip.write_all(b"python").unwrap();
    zip.start_file("python311.zip", options).unwrap();
    zip.write_all(b"stdlib").unwrap();

    zip.finish().unwrap().into_inner()
}

/// Scratch layout: a base dir with a patch manifest and a fake initializer,
/// plus an output dir.
pub struct Fixture {
    pub root: TempDir,
    pub settings: Settings,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path().join("base");
        fs::create_dir_all(base.join("patches")).unwrap();
        fs::write(
            base.join("patches/patches.ini"),
            "[patches]\na.patch = Apply A\nb.patch\n\n[b.patch]\nmessage = Apply B\n",
        )
        .unwrap();

        let initializer = root.path().join("vcvarsall.bat");
        fs::write(&initializer, "@echo off\r\n").unwrap();

        let mut settings = Settings::default();
        settings.toolchain.initializer = Some(initializer.to_string_lossy().to_string());
        settings.toolchain.candidates.clear();

        Self { root, settings }
    }

    pub fn base(&self) -> PathBuf {
        self.root.path().join("base")
    }

    pub fn output(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn target(&self) -> PathBuf {
        let target = self.root.path().join("target");
        fs::create_dir_all(&target).unwrap();
        target
    }

    pub fn pipeline<'a>(
        &'a self,
        runner: &'a FakeRunner,
        fetcher: &'a FakeFetcher,
    ) -> Pipeline<'a> {
        Pipeline::new(&self.settings, runner, fetcher, self.base(), self.output())
    }
}
