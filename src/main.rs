use std::process::ExitCode;

use clap::Parser;

use strata::cli::{self, CliArgs};
use strata::log_info;

fn main() -> ExitCode {
    strata::logger::init();
    log_info!("Strata {} starting", env!("CARGO_PKG_VERSION"));
    let args = CliArgs::parse();
    cli::run(args)
}
