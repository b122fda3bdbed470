//! Options shared by the commands that touch the store or the upstream
//! service, and their resolution into runtime values.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use greenway_core::{FeatureClass, SqliteFeatureStore, SqliteStoreOptions};
use greenway_data::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, FailurePolicy, FeatureSource, FeatureSources,
    HttpFeatureSource, HttpFeatureSourceConfig, default_source_url,
};
use url::Url;

use crate::{
    ARG_ENTRANCES_URL, ARG_MILEMARKERS_URL, ARG_TIMEOUT_SECS, ARG_TRAILS_URL, CliError,
};

/// Database used when `--database` is not given.
pub(crate) const DEFAULT_DATABASE: &str = "greenway.db";

/// Resolved upstream settings.
#[derive(Debug, Clone)]
pub(crate) struct UpstreamConfig {
    /// Query URL per feature class.
    pub(crate) urls: FeatureSources<Url>,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// User agent sent upstream.
    pub(crate) user_agent: String,
    /// What a failed feature write does to the rest of the run.
    pub(crate) policy: FailurePolicy,
}

/// Raw upstream options as merged by the config layers.
#[derive(Debug, Clone, Default)]
pub(crate) struct UpstreamOptions {
    pub(crate) entrances_url: Option<String>,
    pub(crate) milemarkers_url: Option<String>,
    pub(crate) trails_url: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) user_agent: Option<String>,
    pub(crate) on_feature_error: Option<FailurePolicy>,
}

impl TryFrom<UpstreamOptions> for UpstreamConfig {
    type Error = CliError;

    fn try_from(options: UpstreamOptions) -> Result<Self, Self::Error> {
        let urls = FeatureSources::try_from_fn(|class| {
            let (field, value) = match class {
                FeatureClass::Entrances => (ARG_ENTRANCES_URL, &options.entrances_url),
                FeatureClass::MileMarkers => (ARG_MILEMARKERS_URL, &options.milemarkers_url),
                FeatureClass::Trails => (ARG_TRAILS_URL, &options.trails_url),
            };
            let raw = value.clone().unwrap_or_else(|| default_source_url(class));
            Url::parse(&raw).map_err(|source| CliError::InvalidUrl {
                field,
                value: raw,
                source,
            })
        })?;

        let timeout_secs = options.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(CliError::InvalidTimeout {
                field: ARG_TIMEOUT_SECS,
            });
        }

        Ok(Self {
            urls,
            timeout: Duration::from_secs(timeout_secs),
            user_agent: options
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            policy: options.on_feature_error.unwrap_or_default(),
        })
    }
}

/// Builds the upstream sources for a command.
pub(crate) trait SourceFactory {
    type Source: FeatureSource + 'static;

    fn build(&self, config: &UpstreamConfig) -> Result<FeatureSources<Self::Source>, CliError>;
}

/// Factory for the real HTTP sources.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HttpSourceFactory;

impl SourceFactory for HttpSourceFactory {
    type Source = HttpFeatureSource;

    fn build(&self, config: &UpstreamConfig) -> Result<FeatureSources<Self::Source>, CliError> {
        FeatureSources::try_from_fn(|class| {
            let source_config = HttpFeatureSourceConfig::new(config.urls.get(class).clone())
                .with_timeout(config.timeout)
                .with_user_agent(config.user_agent.clone());
            HttpFeatureSource::with_config(source_config)
                .map_err(|source| CliError::BuildSource { class, source })
        })
    }
}

/// Resolve the database path, falling back to [`DEFAULT_DATABASE`].
pub(crate) fn database_path(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

/// Resolve the busy timeout, falling back to the store default.
pub(crate) fn busy_timeout(secs: Option<u64>) -> Duration {
    secs.map_or(SqliteStoreOptions::DEFAULT_BUSY_TIMEOUT, Duration::from_secs)
}

/// Create the database's directory if needed and open the store.
pub(crate) fn open_store(
    path: &Utf8Path,
    busy_timeout: Duration,
) -> Result<SqliteFeatureStore, CliError> {
    greenway_fs::ensure_parent_dir(path).map_err(|source| CliError::PrepareDatabaseDir {
        path: path.to_path_buf(),
        source,
    })?;
    let options = SqliteStoreOptions::default().with_busy_timeout(busy_timeout);
    let store = SqliteFeatureStore::open_with_options(path.as_std_path(), options).map_err(
        |source| CliError::OpenStore {
            path: path.to_path_buf(),
            source,
        },
    )?;
    log::debug!("opened feature store at {path}");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_point_at_the_county_service() {
        let config = UpstreamConfig::try_from(UpstreamOptions::default()).expect("defaults");

        assert_eq!(
            config.urls.get(FeatureClass::Trails).as_str(),
            default_source_url(FeatureClass::Trails)
        );
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.policy, FailurePolicy::Abort);
    }

    #[rstest]
    fn overrides_replace_single_classes() {
        let options = UpstreamOptions {
            milemarkers_url: Some("http://localhost:9000/markers".to_owned()),
            timeout_secs: Some(3),
            on_feature_error: Some(FailurePolicy::Skip),
            ..UpstreamOptions::default()
        };

        let config = UpstreamConfig::try_from(options).expect("config");

        assert_eq!(
            config.urls.get(FeatureClass::MileMarkers).as_str(),
            "http://localhost:9000/markers"
        );
        assert_eq!(
            config.urls.get(FeatureClass::Entrances).as_str(),
            default_source_url(FeatureClass::Entrances)
        );
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.policy, FailurePolicy::Skip);
    }

    #[rstest]
    #[case::entrances(
        UpstreamOptions { entrances_url: Some("not a url".to_owned()), ..UpstreamOptions::default() },
        ARG_ENTRANCES_URL
    )]
    #[case::trails(
        UpstreamOptions { trails_url: Some("::".to_owned()), ..UpstreamOptions::default() },
        ARG_TRAILS_URL
    )]
    fn invalid_urls_name_their_flag(#[case] options: UpstreamOptions, #[case] expected: &str) {
        let err = UpstreamConfig::try_from(options).expect_err("invalid url");
        match err {
            CliError::InvalidUrl { field, .. } => assert_eq!(field, expected),
            other => panic!("expected InvalidUrl, found {other:?}"),
        }
    }

    #[rstest]
    fn zero_timeout_is_rejected() {
        let options = UpstreamOptions {
            timeout_secs: Some(0),
            ..UpstreamOptions::default()
        };
        let err = UpstreamConfig::try_from(options).expect_err("zero timeout");
        assert!(matches!(err, CliError::InvalidTimeout { .. }));
    }

    #[rstest]
    fn open_store_creates_missing_directories() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 tempdir");
        let path = root.join("state/greenway.db");

        open_store(&path, busy_timeout(None)).expect("store opens");

        assert!(path.as_std_path().is_file());
    }

    #[rstest]
    #[case(None, SqliteStoreOptions::DEFAULT_BUSY_TIMEOUT)]
    #[case(Some(0), Duration::ZERO)]
    #[case(Some(30), Duration::from_secs(30))]
    fn busy_timeout_reaches_the_store(#[case] secs: Option<u64>, #[case] expected: Duration) {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 tempdir");

        let store =
            open_store(&root.join("greenway.db"), busy_timeout(secs)).expect("store opens");

        assert_eq!(store.options().busy_timeout, expected);
    }

    #[rstest]
    fn http_sources_use_configured_urls() {
        let config = UpstreamConfig::try_from(UpstreamOptions {
            entrances_url: Some("http://127.0.0.1:1/entrances".to_owned()),
            ..UpstreamOptions::default()
        })
        .expect("config");

        let sources = HttpSourceFactory.build(&config).expect("sources");

        assert_eq!(
            sources.get(FeatureClass::Entrances).location(),
            "http://127.0.0.1:1/entrances"
        );
    }
}
