//! Async facade combining sources, store and leases.

use std::sync::Arc;

use geojson::FeatureCollection;
use greenway_core::{FeatureClass, FeatureStore};
use log::{info, warn};

use crate::{
    read::{ReadError, read_feature_collection},
    source::{FeatureSource, FeatureSources},
    sync::{FailurePolicy, SyncError, SyncLeases, SyncSummary, apply_snapshot},
};

/// Sync and read operations over a shared store.
///
/// Store work runs on Tokio's blocking pool. A sync holds its class lease
/// from before the upstream request until the last write has finished, even
/// when the calling future is dropped part-way.
#[derive(Debug)]
pub struct FeatureService<S, F> {
    store: Arc<S>,
    sources: Arc<FeatureSources<F>>,
    leases: SyncLeases,
    policy: FailurePolicy,
}

impl<S, F> Clone for FeatureService<S, F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sources: Arc::clone(&self.sources),
            leases: self.leases.clone(),
            policy: self.policy,
        }
    }
}

impl<S, F> FeatureService<S, F>
where
    S: FeatureStore + 'static,
    F: FeatureSource,
{
    /// Create a service with the default failure policy.
    pub fn new(store: Arc<S>, sources: FeatureSources<F>) -> Self {
        Self {
            store,
            sources: Arc::new(sources),
            leases: SyncLeases::default(),
            policy: FailurePolicy::default(),
        }
    }

    /// Override the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The lease registry guarding syncs.
    pub const fn leases(&self) -> &SyncLeases {
        &self.leases
    }

    /// Fetch the upstream snapshot of `class` and write it to the store.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InProgress`] when `class` is already syncing.
    /// - [`SyncError::Source`] when the snapshot cannot be fetched.
    /// - [`SyncError::Session`] or [`SyncError::Store`] when the store fails.
    pub async fn sync(&self, class: FeatureClass) -> Result<SyncSummary, SyncError> {
        let lease = self.leases.try_acquire(class)?;
        let source = self.sources.get(class);
        info!("syncing {class} from {}", source.location());

        let snapshot = source
            .fetch_snapshot()
            .await
            .map_err(|err| SyncError::Source { class, source: err })?;

        let store = Arc::clone(&self.store);
        let policy = self.policy;
        let summary = tokio::task::spawn_blocking(move || {
            let _lease = lease;
            let mut session = store
                .session()
                .map_err(|source| SyncError::Session { class, source })?;
            apply_snapshot(&mut session, class, snapshot, policy)
        })
        .await
        .map_err(|source| SyncError::Worker { class, source })??;

        info!(
            "synced {class}: {} of {} upserted, {} skipped, {} failed",
            summary.upserted,
            summary.total,
            summary.skipped.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Sync every class in turn, collecting each outcome.
    pub async fn sync_all(&self) -> Vec<(FeatureClass, Result<SyncSummary, SyncError>)> {
        let mut outcomes = Vec::with_capacity(FeatureClass::ALL.len());
        for class in FeatureClass::ALL {
            let outcome = self.sync(class).await;
            if let Err(err) = &outcome {
                warn!("{class} sync failed: {err}");
            }
            outcomes.push((class, outcome));
        }
        outcomes
    }

    /// Read every stored record of `class` as a feature collection.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] when the store cannot be read.
    pub async fn read(&self, class: FeatureClass) -> Result<FeatureCollection, ReadError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || read_feature_collection(store.as_ref(), class))
            .await
            .map_err(|source| ReadError::Worker { class, source })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceError, SourceSnapshot, test_support::StubFeatureSource};
    use greenway_core::test_support::MemoryFeatureStore;
    use rstest::rstest;
    use serde_json::json;

    fn service_with(
        store: &Arc<MemoryFeatureStore>,
        source: &StubFeatureSource,
    ) -> FeatureService<MemoryFeatureStore, StubFeatureSource> {
        FeatureService::new(
            Arc::clone(store),
            FeatureSources::from_fn(|_| source.clone()),
        )
    }

    fn one_entrance() -> SourceSnapshot {
        serde_json::from_value(json!({"features": [{
            "id": 42,
            "geometry": {"type": "Point", "coordinates": [-80.84, 35.23]},
            "properties": {"Name": "Reedy Creek"}
        }]}))
        .expect("valid snapshot")
    }

    #[rstest]
    #[tokio::test]
    async fn sync_releases_session_and_lease() {
        let store = Arc::new(MemoryFeatureStore::default());
        let service = service_with(&store, &StubFeatureSource::with_snapshot(one_entrance()));

        let summary = service
            .sync(FeatureClass::Entrances)
            .await
            .expect("sync succeeds");

        assert_eq!(summary.upserted, 1);
        assert_eq!(store.open_sessions(), 0);
        assert_eq!(store.sessions_opened(), 1);
        assert!(!service.leases().is_held(FeatureClass::Entrances));
    }

    #[rstest]
    #[tokio::test]
    async fn source_failures_touch_nothing() {
        let store = Arc::new(MemoryFeatureStore::default());
        let source = StubFeatureSource::with_error(SourceError::Network {
            url: "stub://features".to_owned(),
            message: "connection refused".to_owned(),
        });
        let service = service_with(&store, &source);

        let err = service
            .sync(FeatureClass::Trails)
            .await
            .expect_err("source is down");

        assert!(matches!(err, SyncError::Source { .. }));
        assert_eq!(store.sessions_opened(), 0);
        assert!(!service.leases().is_held(FeatureClass::Trails));
    }

    #[rstest]
    #[tokio::test]
    async fn aborted_sync_still_releases_the_session() {
        let store = Arc::new(MemoryFeatureStore::default().reject_writes_for("42"));
        let service = service_with(&store, &StubFeatureSource::with_snapshot(one_entrance()));

        let err = service
            .sync(FeatureClass::Entrances)
            .await
            .expect_err("write is rejected");

        assert!(matches!(err, SyncError::Store { .. }));
        assert_eq!(store.open_sessions(), 0);
        assert!(!service.leases().is_held(FeatureClass::Entrances));
    }

    #[rstest]
    #[tokio::test]
    async fn unavailable_store_fails_the_sync() {
        let store = Arc::new(MemoryFeatureStore::default());
        store.set_unavailable(true);
        let service = service_with(&store, &StubFeatureSource::with_snapshot(one_entrance()));

        let err = service
            .sync(FeatureClass::Entrances)
            .await
            .expect_err("store is down");
        assert!(matches!(err, SyncError::Session { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn sync_all_reports_each_class() {
        let store = Arc::new(MemoryFeatureStore::default());
        let service = service_with(&store, &StubFeatureSource::with_snapshot(one_entrance()));

        let outcomes = service.sync_all().await;

        let classes: Vec<_> = outcomes.iter().map(|(class, _)| *class).collect();
        assert_eq!(classes, FeatureClass::ALL.to_vec());
        // Point geometry cannot be line-merged, so only the trail sync fails.
        let failed: Vec<_> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(class, _)| *class)
            .collect();
        assert_eq!(failed, vec![FeatureClass::Trails]);
    }

    #[rstest]
    #[tokio::test]
    async fn read_returns_synced_features() {
        let store = Arc::new(MemoryFeatureStore::default());
        let service = service_with(&store, &StubFeatureSource::with_snapshot(one_entrance()));
        service
            .sync(FeatureClass::Entrances)
            .await
            .expect("sync succeeds");

        let collection = service
            .read(FeatureClass::Entrances)
            .await
            .expect("read succeeds");
        assert_eq!(collection.features.len(), 1);
        assert!(
            service
                .read(FeatureClass::MileMarkers)
                .await
                .expect("read succeeds")
                .features
                .is_empty()
        );
    }
}
