use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;
use crate::workspace::ReadOnlyPolicy;

pub const CONFIG_FILE: &str = "vimbuild.json";

/// Root configuration structure for vimbuild.json.
///
/// Every section is optional; missing fields fall back to the built-in
/// defaults below, which reproduce the stock Vim-on-Windows pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub patches: PatchConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub lua: LuaConfig,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Upstream repository and the checkout directory name inside the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_source_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// INI manifest, relative to the base directory.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Commit identity passed as `git -c user.name=.. -c user.email=..`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Explicit initializer path; wins over candidate search when it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
    /// Glob patterns searched in order. `$VAR` / `${VAR}` are expanded.
    #[serde(default = "default_toolchain_candidates")]
    pub candidates: Vec<String>,
    /// Argument handed to the initializer (`amd64`, `x86`, ...).
    #[serde(default = "default_arch")]
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_tool")]
    pub tool: String,
    #[serde(default = "default_makefile")]
    pub makefile: String,
    #[serde(default = "default_script_name")]
    pub script_name: String,
    /// Program and leading arguments used to execute the generated script.
    #[serde(default = "default_build_shell")]
    pub shell: Vec<String>,
    #[serde(default = "default_build_flags")]
    pub flags: Vec<String>,
    #[serde(default = "default_gui_flags")]
    pub gui_flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    #[serde(default = "default_python_executable")]
    pub executable: String,
    /// Skips probing when both prefix and version are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `{version}` is replaced with the full interpreter version.
    #[serde(default = "default_embed_url")]
    pub embed_url: String,
    #[serde(default = "default_python_archive_dir")]
    pub archive_dir: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuaConfig {
    /// Lua installation, relative to the base directory.
    #[serde(default = "default_lua_dir")]
    pub dir: String,
    #[serde(default = "default_lua_version")]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,
    /// Version header, relative to the checkout.
    #[serde(default = "default_header")]
    pub header: String,
    /// Runtime support tree, relative to the checkout.
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_binaries")]
    pub binaries: Vec<BinaryEntry>,
}

/// A built file copied into the archive: `src` is relative to the checkout's
/// `src` directory, `name` is the file name inside the runtime directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEntry {
    pub src: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_version_file")]
    pub version_file: String,
    #[serde(default = "default_workspace_prefix")]
    pub workspace_prefix: String,
    #[serde(default = "ReadOnlyPolicy::platform_default")]
    pub read_only: ReadOnlyPolicy,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_source_url() -> String {
    "https://github.com/vim/vim.git".to_string()
}

fn default_source_dir() -> String {
    "vim".to_string()
}

fn default_manifest() -> String {
    "patches/patches.ini".to_string()
}

fn default_toolchain_candidates() -> Vec<String> {
    vec![
        "C:/Program Files/Microsoft Visual Studio/*/*/VC/Auxiliary/Build/vcvarsall.bat"
            .to_string(),
        "C:/Program Files (x86)/Microsoft Visual Studio/*/*/VC/Auxiliary/Build/vcvarsall.bat"
            .to_string(),
        "${VS140COMNTOOLS}/../../VC/vcvarsall.bat".to_string(),
        "${VS100COMNTOOLS}/../../VC/vcvarsall.bat".to_string(),
        "${VS90COMNTOOLS}/../../VC/vcvarsall.bat".to_string(),
    ]
}

fn default_arch() -> String {
    if cfg!(target_pointer_width = "64") {
        "amd64".to_string()
    } else {
        "x86".to_string()
    }
}

fn default_build_tool() -> String {
    "nmake".to_string()
}

fn default_makefile() -> String {
    "make_mvc.mak".to_string()
}

fn default_script_name() -> String {
    "do_build.cmd".to_string()
}

fn default_build_shell() -> Vec<String> {
    vec!["cmd".to_string(), "/c".to_string()]
}

fn default_build_flags() -> Vec<String> {
    vec!["CPUNR=i686".to_string(), "WINVER=0x0500".to_string()]
}

fn default_gui_flags() -> Vec<String> {
    vec!["GUI=yes".to_string(), "DIRECTX=yes".to_string()]
}

fn default_python_executable() -> String {
    "python".to_string()
}

fn default_embed_url() -> String {
    "https://www.python.org/ftp/python/{version}/python-{version}-embed-amd64.zip".to_string()
}

fn default_python_archive_dir() -> String {
    "python".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

fn default_lua_dir() -> String {
    "lua".to_string()
}

fn default_lua_version() -> String {
    "53".to_string()
}

fn default_archive_prefix() -> String {
    "vim".to_string()
}

fn default_header() -> String {
    "src/version.h".to_string()
}

fn default_runtime() -> String {
    "runtime".to_string()
}

fn default_binaries() -> Vec<BinaryEntry> {
    [
        ("vim.exe", "vim.exe"),
        ("gvim.exe", "gvim.exe"),
        ("vimrun.exe", "vimrun.exe"),
        ("xxd/xxd.exe", "xxd.exe"),
        ("GvimExt/gvimext.dll", "gvimext.dll"),
    ]
    .into_iter()
    .map(|(src, name)| BinaryEntry {
        src: src.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn default_version_file() -> String {
    "version.txt".to_string()
}

fn default_workspace_prefix() -> String {
    "vimbuild-".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            dir: default_source_dir(),
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            author_name: None,
            author_email: None,
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            initializer: None,
            candidates: default_toolchain_candidates(),
            arch: default_arch(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool: default_build_tool(),
            makefile: default_makefile(),
            script_name: default_script_name(),
            shell: default_build_shell(),
            flags: default_build_flags(),
            gui_flags: default_gui_flags(),
        }
    }
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            executable: default_python_executable(),
            prefix: None,
            version: None,
            embed_url: default_embed_url(),
            archive_dir: default_python_archive_dir(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for LuaConfig {
    fn default() -> Self {
        Self {
            dir: default_lua_dir(),
            version: default_lua_version(),
        }
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            archive_prefix: default_archive_prefix(),
            header: default_header(),
            runtime: default_runtime(),
            binaries: default_binaries(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            version_file: default_version_file(),
            workspace_prefix: default_workspace_prefix(),
            read_only: ReadOnlyPolicy::platform_default(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Load settings.
///
/// An explicit path must exist and parse. Otherwise `./vimbuild.json` and then
/// the user config file are tried; when neither exists the built-in defaults
/// are used. A file that exists but does not parse is always an error.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return load_settings_from(path);
    }

    for candidate in config_candidates() {
        if candidate.is_file() {
            log_status!("config", "Using {}", candidate.display());
            return load_settings_from(&candidate);
        }
    }

    Ok(Settings::default())
}

fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(CONFIG_FILE)];
    if let Ok(path) = paths::config_file() {
        candidates.push(path);
    }
    candidates
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = io::read_file(path, "read settings")?;
    parse_settings(&content, &path.display().to_string())
}

pub fn parse_settings(content: &str, origin: &str) -> Result<Settings> {
    let settings: Settings =
        serde_json::from_str(content).map_err(|e| Error::config_invalid_json(origin, e))?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.source.dir.trim().is_empty() {
        return Err(Error::config_invalid_value(
            "source.dir",
            Some(settings.source.dir.clone()),
            "must not be empty",
        ));
    }
    if settings.build.shell.is_empty() {
        return Err(Error::config_invalid_value(
            "build.shell",
            None,
            "needs at least the program to run the build script with",
        ));
    }
    if !settings.python.embed_url.contains("{version}") {
        return Err(Error::config_invalid_value(
            "python.embed_url",
            Some(settings.python.embed_url.clone()),
            "must contain the {version} placeholder",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_builtin_defaults() {
        let settings = parse_settings("{}", "test").unwrap();
        assert_eq!(settings.source.url, "https://github.com/vim/vim.git");
        assert_eq!(settings.source.dir, "vim");
        assert_eq!(settings.patches.manifest, "patches/patches.ini");
        assert_eq!(settings.build.script_name, "do_build.cmd");
        assert_eq!(settings.package.binaries.len(), 5);
        assert_eq!(settings.output.version_file, "version.txt");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let settings = parse_settings(
            r#"{"toolchain": {"initializer": "C:/VS/vcvarsall.bat"}, "lua": {"version": "54"}}"#,
            "test",
        )
        .unwrap();

        assert_eq!(
            settings.toolchain.initializer.as_deref(),
            Some("C:/VS/vcvarsall.bat")
        );
        assert_eq!(settings.toolchain.candidates.len(), 5);
        assert_eq!(settings.lua.version, "54");
        assert_eq!(settings.lua.dir, "lua");
    }

    #[test]
    fn read_only_policy_parses_lowercase() {
        let settings = parse_settings(r#"{"output": {"read_only": "clear"}}"#, "test").unwrap();
        assert_eq!(settings.output.read_only, ReadOnlyPolicy::Clear);
    }

    #[test]
    fn invalid_json_reports_origin() {
        let err = parse_settings("{not json", "vimbuild.json").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
        assert_eq!(err.details["path"], "vimbuild.json");
    }

    #[test]
    fn embed_url_without_placeholder_is_rejected() {
        let err = parse_settings(
            r#"{"python": {"embed_url": "https://example.invalid/python.zip"}}"#,
            "test",
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
        assert_eq!(err.details["key"], "python.embed_url");
    }

    #[test]
    fn empty_build_shell_is_rejected() {
        let err = parse_settings(r#"{"build": {"shell": []}}"#, "test").unwrap_err();
        assert_eq!(err.details["key"], "build.shell");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_settings(Some(Path::new("/nonexistent/vimbuild.json"))).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, r#"{"source": {"dir": "editor"}}"#).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.source.dir, "editor");
    }

    #[test]
    fn default_settings_round_trip_through_json() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        let parsed = parse_settings(&json, "roundtrip").unwrap();
        assert_eq!(parsed.package.binaries, default_binaries());
    }
}
