//! Subcommand dispatch.

pub mod watch;

use crate::cli::args::{Cli, Commands};
use crate::error::BriefwatchError;

/// Dispatches the parsed CLI to its subcommand.
///
/// # Errors
///
/// Propagates the subcommand's error for exit-code mapping in `main`.
pub async fn dispatch(cli: Cli) -> Result<(), BriefwatchError> {
    match cli.command {
        Commands::Watch(args) => watch::run(&args).await,
    }
}
