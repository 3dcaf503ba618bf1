//! Build stage: render a `cmd` script that initializes the toolchain and runs
//! the console and GUI builds, then execute it.

use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::python;
use crate::toolchain;
use crate::utils::command::ToolCommand;
use crate::utils::{io, parser, shell};

use super::Pipeline;

const LINE_END: &str = "\r\n";
const PROPAGATE_FAILURE: &str = "if errorlevel 1 exit /b %errorlevel%";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub python: bool,
    pub lua: bool,
    /// Extra build tool arguments, appended verbatim to both build lines.
    pub make: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            python: true,
            lua: true,
            make: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub script: String,
    pub initializer: String,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_root: Option<String>,
}

/// Everything the script text depends on.
#[derive(Debug, Clone)]
pub struct ScriptSpec<'a> {
    pub initializer: &'a Path,
    pub arch: &'a str,
    pub source_dir: &'a str,
    pub tool: &'a str,
    pub makefile: &'a str,
    pub flags: &'a [String],
    pub gui_flags: &'a [String],
}

/// Render the build script with CRLF line endings.
pub fn render_script(spec: &ScriptSpec) -> String {
    let base = format!("{} /f {}", spec.tool, spec.makefile);
    let console = join_line(&base, spec.flags.iter());
    let gui = join_line(&base, spec.gui_flags.iter().chain(spec.flags.iter()));

    let lines = [
        format!(
            "call \"{}\" {}",
            spec.initializer.to_string_lossy().replace('"', ""),
            spec.arch
        ),
        format!("cd {}\\src", spec.source_dir),
        console,
        PROPAGATE_FAILURE.to_string(),
        gui,
        PROPAGATE_FAILURE.to_string(),
    ];

    let mut script = lines.join(LINE_END);
    script.push_str(LINE_END);
    script
}

fn join_line<'a>(base: &str, flags: impl Iterator<Item = &'a String>) -> String {
    let mut line = base.to_string();
    for flag in flags.filter(|f| !f.trim().is_empty()) {
        line.push(' ');
        line.push_str(flag.trim());
    }
    line
}

pub fn build(pipeline: &Pipeline, target: &Path, options: &BuildOptions) -> Result<BuildOutput> {
    let settings = pipeline.settings;
    let initializer = toolchain::resolve_initializer(&settings.toolchain)?;

    let mut flags = settings.build.flags.clone();
    if options.python {
        let info = python::resolve(&settings.python, pipeline.runner)?;
        flags.extend(info.build_flags()?);
    }
    if options.lua {
        let lua_dir = parser::resolve_path(&pipeline.base_dir, &settings.lua.dir);
        flags.push(format!(
            "LUA={}",
            shell::quote_cmd_arg(&lua_dir.to_string_lossy())
        ));
        flags.push(format!("LUA_VER={}", settings.lua.version));
    }
    if !options.make.trim().is_empty() {
        flags.push(options.make.clone());
    }

    let script = render_script(&ScriptSpec {
        initializer: &initializer,
        arch: &settings.toolchain.arch,
        source_dir: &settings.source.dir,
        tool: &settings.build.tool,
        makefile: &settings.build.makefile,
        flags: &flags,
        gui_flags: &settings.build.gui_flags,
    });

    let script_path = target.join(&settings.build.script_name);
    io::write_file(&script_path, &script, "write build script")?;
    log_status!("build", "Wrote {}", script_path.display());

    let (program, leading) = settings
        .build
        .shell
        .split_first()
        .ok_or_else(|| Error::config_invalid_value("build.shell", None, "must not be empty"))?;
    let mut args = leading.to_vec();
    args.push(settings.build.script_name.clone());

    pipeline
        .runner
        .run(&ToolCommand::new(program, args).in_dir(target).passthrough())?;

    Ok(BuildOutput {
        script: script_path.to_string_lossy().to_string(),
        initializer: initializer.to_string_lossy().to_string(),
        arch: settings.toolchain.arch.clone(),
        toolchain_root: toolchain::install_root(&initializer)
            .map(|root| root.to_string_lossy().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeFetcher, FakeRunner, Fixture};
    use std::fs;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn script_has_initializer_both_builds_and_errorlevel_checks() {
        let flags = strings(&["CPUNR=i686", "WINVER=0x0500"]);
        let gui_flags = strings(&["GUI=yes", "DIRECTX=yes"]);
        let script = render_script(&ScriptSpec {
            initializer: Path::new("C:\\VS\\VC\\vcvarsall.bat"),
            arch: "amd64",
            source_dir: "vim",
            tool: "nmake",
            makefile: "make_mvc.mak",
            flags: &flags,
            gui_flags: &gui_flags,
        });

        assert_eq!(
            script,
            "call \"C:\\VS\\VC\\vcvarsall.bat\" amd64\r\n\
             cd vim\\src\r\n\
             nmake /f make_mvc.mak CPUNR=i686 WINVER=0x0500\r\n\
             if errorlevel 1 exit /b %errorlevel%\r\n\
             nmake /f make_mvc.mak GUI=yes DIRECTX=yes CPUNR=i686 WINVER=0x0500\r\n\
             if errorlevel 1 exit /b %errorlevel%\r\n"
        );
    }

    #[test]
    fn build_writes_script_and_runs_it_in_target() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let fetcher = FakeFetcher::default();
        let target = fixture.target();

        let output = build(
            &fixture.pipeline(&runner, &fetcher),
            &target,
            &BuildOptions {
                make: "DEBUG=yes".to_string(),
                ..BuildOptions::default()
            },
        )
        .unwrap();

        let script = fs::read_to_string(target.join("do_build.cmd")).unwrap();
        assert!(script.contains("PYTHON3=\"C:\\Python311\" DYNAMIC_PYTHON3=yes PYTHON3_VER=311"));
        assert!(script.contains("LUA_VER=53"));
        assert!(script.contains("DEBUG=yes\r\n"));
        assert_eq!(output.script, target.join("do_build.cmd").to_string_lossy());

        let calls = runner.calls.borrow();
        let last = calls.last().unwrap();
        assert_eq!(last.program, "cmd");
        assert_eq!(last.args, vec!["/c", "do_build.cmd"]);
        assert_eq!(last.cwd.as_deref(), Some(target.as_path()));
        assert!(last.passthrough);
    }

    #[test]
    fn disabled_interpreters_are_left_out() {
        let fixture = Fixture::new();
        let runner = FakeRunner::default();
        let fetcher = FakeFetcher::default();
        let target = fixture.target();

        build(
            &fixture.pipeline(&runner, &fetcher),
            &target,
            &BuildOptions {
                python: false,
                lua: false,
                make: String::new(),
            },
        )
        .unwrap();

        let script = fs::read_to_string(target.join("do_build.cmd")).unwrap();
        assert!(!script.contains("PYTHON3"));
        assert!(!script.contains("LUA"));
        assert_eq!(runner.programs(), vec!["cmd"]);
    }

    #[test]
    fn missing_toolchain_fails_before_running_anything() {
        let mut fixture = Fixture::new();
        fixture.settings.toolchain.initializer = None;
        let runner = FakeRunner::default();
        let fetcher = FakeFetcher::default();

        let err = build(
            &fixture.pipeline(&runner, &fetcher),
            &fixture.target(),
            &BuildOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.code.as_str(), "toolchain.not_found");
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn script_failure_carries_exit_code() {
        let fixture = Fixture::new();
        let runner = FakeRunner::failing("cmd", 2);
        let fetcher = FakeFetcher::default();

        let err = build(
            &fixture.pipeline(&runner, &fetcher),
            &fixture.target(),
            &BuildOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.tool_exit_code(), Some(2));
    }
}
