use std::process::ExitCode;

use timetracker::cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error running cli {e:?}");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
