//! Error types emitted by the Greenway CLI.

use std::{error::Error as StdError, fmt::Write as _, io, net::AddrParseError, sync::Arc};

use camino::Utf8PathBuf;
use greenway_core::{FeatureClass, SqliteFeatureStoreError};
use greenway_data::{ReadError, SourceBuildError};
use thiserror::Error;

/// Errors emitted by the Greenway CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An upstream URL could not be parsed.
    #[error("{field} {value:?} is not a valid URL: {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    /// The upstream timeout was zero.
    #[error("{field} must be at least one second")]
    InvalidTimeout { field: &'static str },
    /// The listen address could not be parsed.
    #[error("{field} {value:?} is not a socket address: {source}")]
    InvalidBindAddress {
        field: &'static str,
        value: String,
        #[source]
        source: AddrParseError,
    },
    /// The static asset directory is absent or not a directory.
    #[error("{field} path {path:?} does not exist or is not a directory")]
    StaticDirNotDirectory {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// The static asset directory could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectStaticDir {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// Creating the directory holding the database failed.
    #[error("failed to prepare directory for {path:?}: {source}")]
    PrepareDatabaseDir {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// Opening the feature database failed.
    #[error("failed to open feature store at {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: SqliteFeatureStoreError,
    },
    /// Building an upstream HTTP client failed.
    #[error("failed to build {class} source: {source}")]
    BuildSource {
        class: FeatureClass,
        #[source]
        source: SourceBuildError,
    },
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
    /// The HTTP listener could not bind.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] io::Error),
    /// One or more classes did not sync cleanly.
    #[error("sync failed for {classes}")]
    SyncFailed { classes: String },
    /// Reading a class for export failed.
    #[error("failed to export {class}: {source}")]
    Export {
        class: FeatureClass,
        #[source]
        source: ReadError,
    },
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] io::Error),
    /// Writing an export file failed.
    #[error("failed to write export to {path:?}: {source}")]
    WriteExport {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// A logger was already installed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[from] log::SetLoggerError),
}

/// Render an error followed by every source in its chain.
pub(crate) fn describe_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        let _ = write!(rendered, ": {cause}");
        next = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[rstest]
    fn chain_includes_every_source() {
        assert_eq!(describe_chain(&Outer(Inner)), "outer: inner");
    }

    #[rstest]
    fn missing_argument_names_flag_and_env() {
        let err = CliError::MissingArgument {
            field: "class",
            env: "GREENWAY_CMDS_EXPORT_CLASS",
        };
        assert_eq!(
            err.to_string(),
            "missing class (set --class or GREENWAY_CMDS_EXPORT_CLASS)"
        );
    }
}
