use clap::Parser;
use mpd_gateway::app::{self, cli::Args, config::AppConfig};
use mpd_gateway::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    human_panic::setup_panic!();

    let args = Args::parse();
    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => app::apply_overrides(config, &args),
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(config.log_directory.as_deref(), args.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: could not initialise logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match app::run(args, config) {
        Ok(Some(value)) => match serde_json::to_string_pretty(&value) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
