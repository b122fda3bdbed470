//! `export` command: print a stored class as GeoJSON.

use std::{io::Write, time::Duration};

use camino::Utf8PathBuf;
use clap::Parser;
use greenway_core::FeatureClass;
use greenway_data::read_feature_collection;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BUSY_TIMEOUT_SECS, ARG_CLASS, ARG_DATABASE, ARG_OUTPUT, CliError, ENV_EXPORT_CLASS, options,
};

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read every stored feature of one class and print it as a \
                 GeoJSON feature collection, exactly as GET /api/<class> \
                 would return it.",
    about = "Export a feature class as GeoJSON"
)]
#[ortho_config(prefix = "GREENWAY")]
pub(crate) struct ExportArgs {
    /// Feature class to export.
    #[arg(value_name = "class")]
    #[serde(default)]
    pub(crate) class: Option<FeatureClass>,
    /// Path to the SQLite feature database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Seconds to wait on a locked database before failing.
    #[arg(long = ARG_BUSY_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) busy_timeout_secs: Option<u64>,
    /// Write to this file instead of stdout.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl ExportArgs {
    pub(crate) fn into_config(self) -> Result<ExportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExportConfig::try_from(merged)
    }
}

/// Resolved `export` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    pub(crate) class: FeatureClass,
    pub(crate) database: Utf8PathBuf,
    pub(crate) busy_timeout: Duration,
    pub(crate) output: Option<Utf8PathBuf>,
}

impl TryFrom<ExportArgs> for ExportConfig {
    type Error = CliError;

    fn try_from(args: ExportArgs) -> Result<Self, Self::Error> {
        let class = args.class.ok_or(CliError::MissingArgument {
            field: ARG_CLASS,
            env: ENV_EXPORT_CLASS,
        })?;
        Ok(Self {
            class,
            database: options::database_path(args.database),
            busy_timeout: options::busy_timeout(args.busy_timeout_secs),
            output: args.output,
        })
    }
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_export_with(args, &mut stdout)
}

pub(crate) fn run_export_with(args: ExportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = options::open_store(&config.database, config.busy_timeout)?;
    let collection = read_feature_collection(&store, config.class).map_err(|source| {
        CliError::Export {
            class: config.class,
            source,
        }
    })?;
    let mut payload =
        serde_json::to_string_pretty(&collection).map_err(CliError::SerialiseOutput)?;
    payload.push('\n');

    match &config.output {
        Some(path) => {
            greenway_fs::write_file(path, payload.as_bytes()).map_err(|source| {
                CliError::WriteExport {
                    path: path.clone(),
                    source,
                }
            })?;
            log::info!(
                "exported {} {} to {path}",
                collection.features.len(),
                config.class.label()
            );
        }
        None => writer
            .write_all(payload.as_bytes())
            .map_err(CliError::WriteOutput)?,
    }
    Ok(())
}
