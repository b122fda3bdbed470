//! `serve` command: the long-running HTTP service.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use camino::Utf8PathBuf;
use clap::Parser;
use greenway_data::{FailurePolicy, FeatureService};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{
    ARG_BIND, ARG_BUSY_TIMEOUT_SECS, ARG_DATABASE, ARG_ENTRANCES_URL, ARG_MILEMARKERS_URL,
    ARG_ON_FEATURE_ERROR, ARG_STATIC_DIR, ARG_TIMEOUT_SECS, ARG_TRAILS_URL, ARG_USER_AGENT,
    CliError, http,
    options::{self, HttpSourceFactory, SourceFactory, UpstreamConfig, UpstreamOptions},
};

/// Listen address used when `--bind` is not given.
pub(crate) const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve the Greenway API. GET /api/sync-<class> pulls a fresh \
                 snapshot from the county GIS service and GET /api/<class> \
                 returns the stored features as GeoJSON. Options can come \
                 from CLI flags, configuration files, or environment \
                 variables.",
    about = "Serve the sync and read API"
)]
#[ortho_config(prefix = "GREENWAY")]
pub(crate) struct ServeArgs {
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
    /// Address to listen on.
    #[arg(long = ARG_BIND, value_name = "addr")]
    #[serde(default)]
    pub(crate) bind: Option<String>,
    /// Directory holding the map frontend.
    #[arg(long = ARG_STATIC_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) static_dir: Option<Utf8PathBuf>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct ServeConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) busy_timeout: Duration,
    pub(crate) upstream: UpstreamConfig,
    pub(crate) bind: SocketAddr,
    pub(crate) static_dir: Option<Utf8PathBuf>,
}

impl ServeConfig {
    pub(crate) fn validate_static_dir(&self) -> Result<(), CliError> {
        let Some(path) = &self.static_dir else {
            return Ok(());
        };
        match greenway_fs::is_directory(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::StaticDirNotDirectory {
                field: ARG_STATIC_DIR,
                path: path.clone(),
            }),
            Err(source) => Err(CliError::InspectStaticDir {
                field: ARG_STATIC_DIR,
                path: path.clone(),
                source,
            }),
        }
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let upstream = UpstreamConfig::try_from(UpstreamOptions {
            entrances_url: args.entrances_url,
            milemarkers_url: args.milemarkers_url,
            trails_url: args.trails_url,
            timeout_secs: args.timeout_secs,
            user_agent: args.user_agent,
            on_feature_error: args.on_feature_error,
        })?;
        let raw_bind = args.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = raw_bind
            .parse()
            .map_err(|source| CliError::InvalidBindAddress {
                field: ARG_BIND,
                value: raw_bind.clone(),
                source,
            })?;
        Ok(Self {
            database: options::database_path(args.database),
            busy_timeout: options::busy_timeout(args.busy_timeout_secs),
            upstream,
            bind,
            static_dir: args.static_dir,
        })
    }
}

pub(crate) fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_static_dir()?;

    let store = options::open_store(&config.database, config.busy_timeout)?;
    let sources = HttpSourceFactory.build(&config.upstream)?;
    let service = FeatureService::new(Arc::new(store), sources)
        .with_failure_policy(config.upstream.policy);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(async {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|source| CliError::Bind {
                addr: config.bind,
                source,
            })?;
        log::info!(
            "serving greenway data from {} on http://{}",
            config.database,
            config.bind
        );
        if let Some(dir) = &config.static_dir {
            log::info!("serving frontend from {dir}");
        }
        let app = http::router(service, config.static_dir.as_deref());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(CliError::Serve)
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutting down"),
        Err(err) => log::warn!("could not listen for ctrl-c: {err}"),
    }
}
