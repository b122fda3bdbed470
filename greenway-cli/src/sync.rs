//! `sync` command: one-shot operator trigger for the sync operation.

use std::{io::Write, sync::Arc, time::Duration};

use camino::Utf8PathBuf;
use clap::Parser;
use greenway_core::FeatureClass;
use greenway_data::{FailurePolicy, FeatureService, SyncError, SyncSummary};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BUSY_TIMEOUT_SECS, ARG_DATABASE, ARG_ENTRANCES_URL, ARG_MILEMARKERS_URL,
    ARG_ON_FEATURE_ERROR, ARG_TIMEOUT_SECS, ARG_TRAILS_URL, ARG_USER_AGENT, CliError,
    error::describe_chain,
    options::{self, HttpSourceFactory, SourceFactory, UpstreamConfig, UpstreamOptions},
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Pull the upstream snapshot for one feature class, or for \
                 entrances, mile markers and trails in turn, and upsert it \
                 into the local store. Prints one JSON report per class and \
                 exits non-zero when any class failed.",
    about = "Sync feature classes from the county GIS service"
)]
#[ortho_config(prefix = "GREENWAY")]
pub(crate) struct SyncArgs {
    /// Feature class to sync; all classes when omitted.
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
    /// Query URL for park entrances.
    #[arg(long = ARG_ENTRANCES_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) entrances_url: Option<String>,
    /// Query URL for mile markers.
    #[arg(long = ARG_MILEMARKERS_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) milemarkers_url: Option<String>,
    /// Query URL for trails.
    #[arg(long = ARG_TRAILS_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) trails_url: Option<String>,
    /// Upstream request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// User agent sent to the upstream service.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// What a failed feature write does: `abort` or `skip`.
    #[arg(long = ARG_ON_FEATURE_ERROR, value_name = "policy")]
    #[serde(default)]
    pub(crate) on_feature_error: Option<FailurePolicy>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct SyncConfig {
    pub(crate) class: Option<FeatureClass>,
    pub(crate) database: Utf8PathBuf,
    pub(crate) busy_timeout: Duration,
    pub(crate) upstream: UpstreamConfig,
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let upstream = UpstreamConfig::try_from(UpstreamOptions {
            entrances_url: args.entrances_url,
            milemarkers_url: args.milemarkers_url,
            trails_url: args.trails_url,
            timeout_secs: args.timeout_secs,
            user_agent: args.user_agent,
            on_feature_error: args.on_feature_error,
        })?;
        Ok(Self {
            class: args.class,
            database: options::database_path(args.database),
            busy_timeout: options::busy_timeout(args.busy_timeout_secs),
            upstream,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum SyncStatus {
    Synced,
    Failed,
}

/// Per-class outcome printed by the command.
#[derive(Debug, Serialize)]
struct SyncReport {
    class: FeatureClass,
    status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SyncSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SyncReport {
    fn from_outcome(class: FeatureClass, outcome: Result<SyncSummary, SyncError>) -> Self {
        match outcome {
            Ok(summary) => Self {
                class,
                status: SyncStatus::Synced,
                summary: Some(summary),
                error: None,
            },
            Err(err) => {
                let error = describe_chain(&err);
                log::error!("{} sync failed: {error}", class.label());
                Self {
                    class,
                    status: SyncStatus::Failed,
                    summary: err.summary().cloned(),
                    error: Some(error),
                }
            }
        }
    }
}

pub(crate) fn run_sync(args: SyncArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_sync_with(args, &HttpSourceFactory, &mut stdout)
}

pub(crate) fn run_sync_with<B: SourceFactory>(
    args: SyncArgs,
    factory: &B,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let reports = execute_sync(&config, factory)?;
    write_reports(writer, &reports)?;

    let failed: Vec<&str> = reports
        .iter()
        .filter(|report| report.status == SyncStatus::Failed)
        .map(|report| report.class.label())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::SyncFailed {
            classes: failed.join(", "),
        })
    }
}

fn execute_sync<B: SourceFactory>(
    config: &SyncConfig,
    factory: &B,
) -> Result<Vec<SyncReport>, CliError> {
    let store = options::open_store(&config.database, config.busy_timeout)?;
    let sources = factory.build(&config.upstream)?;
    let service = FeatureService::new(Arc::new(store), sources)
        .with_failure_policy(config.upstream.policy);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let outcomes = runtime.block_on(async {
        match config.class {
            Some(class) => vec![(class, service.sync(class).await)],
            None => service.sync_all().await,
        }
    });
    Ok(outcomes
        .into_iter()
        .map(|(class, outcome)| SyncReport::from_outcome(class, outcome))
        .collect())
}

fn write_reports(writer: &mut dyn Write, reports: &[SyncReport]) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(reports).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
