//! dupindex - content-addressed file indexer
//!
//! Entry point for the CLI.

use clap::Parser;
use dupindex::{
    cli::Cli,
    error::{render_fatal, ExitCode},
};

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match dupindex::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::for_error(&err);
            // Full chain for -v; the rendered line is the report.
            log::debug!("Fatal error: {:?}", err);
            eprintln!("{}", render_fatal(&err, exit_code, json_errors));
            std::process::exit(exit_code.as_i32());
        }
    }
}
