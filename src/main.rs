use clap::Parser;

mod commands;
mod output;
mod tty;

use commands::GlobalArgs;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "vimbuild")]
#[command(version = VERSION)]
#[command(about = "Build and package Vim for Windows")]
#[command(after_help = "Commands: get [target=.], patch [target=.], \
build [target=.] [python=true] [lua=true] [make=], package [target=.] [version=unknown], \
all [python=true] [lua=true] [make=]\n\n\
Several commands may be chained: vimbuild get patch build")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Commands, each followed by its key=value, --flag or positional arguments
    #[arg(
        required = true,
        value_name = "COMMAND [ARGS]...",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    tokens: Vec<String>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = commands::run::run(cli.tokens, &cli.global);
    let (json_result, exit_code) = output::map_cmd_result_to_json(result);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
