//! `briefwatch` — progress tracking and watchdog supervision for
//! long-running research runs

use clap::Parser;

use briefwatch::cli::args::Cli;
use briefwatch::cli::commands;
use briefwatch::error::ExitCode;
use briefwatch::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Human
        };
        init_logging(format, cli.verbose, cli.color);
    }

    match commands::dispatch(cli).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
