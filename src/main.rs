//! materialize-base CLI entry point.

use clap::Parser;
use mdbase::cli::{run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.render_chain());
            ExitCode::FAILURE
        }
    }
}
