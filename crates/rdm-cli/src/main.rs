use rdm_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Log to the state dir; a read-only home still gets stderr logs.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("rdm error: {:#}", err);
        std::process::exit(1);
    }
}
