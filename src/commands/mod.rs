use clap::Args;
use std::path::PathBuf;

pub type CmdResult<T> = vimbuild::Result<(T, i32)>;

pub mod run;

/// Flags shared by every invocation, ahead of the command tokens.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (default: ./vimbuild.json, then the user config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where the archive, its sidecar and version.txt are written
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory the patch manifest, Lua and relative targets resolve against
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,
}
