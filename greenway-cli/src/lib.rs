//! Command-line interface for the Greenway trail data service.
//!
//! `greenway serve` exposes the sync and read routes over HTTP, `greenway
//! sync` runs the same sync operation once from a shell, and `greenway
//! export` prints a stored feature class as GeoJSON.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod export;
mod http;
mod logging;
mod options;
mod serve;
mod sync;

pub use error::CliError;

use export::ExportArgs;
use serve::ServeArgs;
use sync::SyncArgs;

pub(crate) const ARG_CLASS: &str = "class";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_BUSY_TIMEOUT_SECS: &str = "busy-timeout-secs";
pub(crate) const ARG_ENTRANCES_URL: &str = "entrances-url";
pub(crate) const ARG_MILEMARKERS_URL: &str = "milemarkers-url";
pub(crate) const ARG_TRAILS_URL: &str = "trails-url";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ARG_USER_AGENT: &str = "user-agent";
pub(crate) const ARG_ON_FEATURE_ERROR: &str = "on-feature-error";
pub(crate) const ARG_BIND: &str = "bind";
pub(crate) const ARG_STATIC_DIR: &str = "static-dir";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ENV_EXPORT_CLASS: &str = "GREENWAY_CMDS_EXPORT_CLASS";

/// Run the Greenway CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, or when
/// the selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()?;
    logging::init()?;
    match cli.command {
        Command::Serve(args) => serve::run_serve(args),
        Command::Sync(args) => sync::run_sync(args),
        Command::Export(args) => export::run_export(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "greenway",
    about = "Sync and serve Mecklenburg County greenway data",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the sync and read API, plus the map frontend when configured.
    Serve(ServeArgs),
    /// Pull upstream snapshots into the local store once.
    Sync(SyncArgs),
    /// Print a stored feature class as a GeoJSON feature collection.
    Export(ExportArgs),
}

#[cfg(test)]
mod tests;
