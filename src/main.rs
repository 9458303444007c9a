use log::{debug, error};
use std::process::ExitCode;

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod utils;

use config::Config;
use utils::logger;

fn main() -> ExitCode {
    let cli = cli::parse();
    let _ = logger::init(logger::level_for(cli.quiet, cli.verbose));

    let (config, msg) = Config::load();
    debug!("{}", msg);

    match commands::dispatch(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exit by error: {}", e);
            for cause in e.chain().skip(1) {
                error!("  caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
