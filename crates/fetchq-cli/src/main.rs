use fetchq_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible.
    if let Err(file_err) = logging::init_logging() {
        if let Err(err) = logging::init_logging_stderr() {
            eprintln!("fetchq: logging disabled: {:#} ({:#})", err, file_err);
        }
    }

    // Parse CLI and dispatch.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("fetchq error: {:#}", err);
        std::process::exit(1);
    }
}
