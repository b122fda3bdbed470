//! Fixtures shared by the CLI tests.

use std::{collections::BTreeMap, sync::Mutex};

use camino::Utf8PathBuf;
use greenway_core::FeatureClass;
use greenway_data::{
    FeatureSources, SourceError, SourceSnapshot, source::test_support::StubFeatureSource,
};
use tempfile::TempDir;

use crate::{
    CliError,
    options::{SourceFactory, UpstreamConfig},
};

/// Temporary directory exposed as a UTF-8 path.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    pub(super) root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }
}

/// Snapshot with one point feature per id.
pub(super) fn point_snapshot(ids: &[&str]) -> SourceSnapshot {
    let features: Vec<_> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "geometry": {"type": "Point", "coordinates": [-80.84, 35.23]},
                "properties": {"Name": format!("Feature {id}")}
            })
        })
        .collect();
    serde_json::from_value(serde_json::json!({ "features": features })).expect("valid snapshot")
}

/// Factory handing out stub sources configured per class.
#[derive(Debug, Default)]
pub(super) struct StubSourceFactory {
    outcomes: Mutex<BTreeMap<FeatureClass, Result<SourceSnapshot, SourceError>>>,
}

impl StubSourceFactory {
    pub(super) fn set(&self, class: FeatureClass, outcome: Result<SourceSnapshot, SourceError>) {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .insert(class, outcome);
    }
}

impl SourceFactory for StubSourceFactory {
    type Source = StubFeatureSource;

    fn build(&self, _config: &UpstreamConfig) -> Result<FeatureSources<Self::Source>, CliError> {
        let outcomes = self.outcomes.lock().expect("outcomes lock");
        Ok(FeatureSources::from_fn(|class| {
            let outcome = outcomes
                .get(&class)
                .cloned()
                .unwrap_or_else(|| Ok(SourceSnapshot::default()));
            StubFeatureSource::with_outcomes([outcome])
        }))
    }
}
