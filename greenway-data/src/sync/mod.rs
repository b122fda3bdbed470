//! Reconciling an upstream snapshot into the feature store.
//!
//! Features are written one at a time, in snapshot order, through a single
//! store session. Rows absent from the snapshot are left alone. Each run
//! yields a [`SyncSummary`]; what a failed write does to the rest of the run
//! is decided by the [`FailurePolicy`].

mod lease;
mod summary;

use greenway_core::{
    Attributes, ExternalId, FeatureClass, FeatureRecord, FeatureSession, FeatureStoreError,
    geometry::parse_interchange,
};
use log::{debug, warn};
use thiserror::Error;

use crate::source::{SourceError, SourceFeature, SourceSnapshot};

pub use lease::{SyncLease, SyncLeases};
pub use summary::{
    FailedFeature, FailurePolicy, ParseFailurePolicyError, SkipReason, SkippedFeature, SyncSummary,
};

/// Errors raised by a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync of the class holds the lease.
    #[error("{label} sync already in progress", label = .class.label())]
    InProgress {
        /// Class that is already syncing.
        class: FeatureClass,
    },
    /// The upstream snapshot could not be fetched.
    #[error("failed to fetch the {class} snapshot")]
    Source {
        /// Class being synced.
        class: FeatureClass,
        /// Fetch failure.
        #[source]
        source: SourceError,
    },
    /// No store session could be acquired.
    #[error("failed to open a store session for {class}")]
    Session {
        /// Class being synced.
        class: FeatureClass,
        /// Store failure.
        #[source]
        source: FeatureStoreError,
    },
    /// A feature could not be stored and the run was aborted.
    #[error("failed to store {class} feature {external_id}; sync aborted")]
    Store {
        /// Class being synced.
        class: FeatureClass,
        /// Feature that failed.
        external_id: ExternalId,
        /// Accounting up to and including the failure.
        summary: Box<SyncSummary>,
        /// Store failure.
        #[source]
        source: FeatureStoreError,
    },
    /// The blocking store task did not complete.
    #[error("{class} sync worker did not complete")]
    Worker {
        /// Class being synced.
        class: FeatureClass,
        /// Join failure.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl SyncError {
    /// Class the failed run targeted.
    #[must_use]
    pub const fn class(&self) -> FeatureClass {
        match self {
            Self::InProgress { class }
            | Self::Source { class, .. }
            | Self::Session { class, .. }
            | Self::Store { class, .. }
            | Self::Worker { class, .. } => *class,
        }
    }

    /// Partial accounting, when the run got as far as writing.
    #[must_use]
    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            Self::Store { summary, .. } => Some(summary.as_ref()),
            _ => None,
        }
    }
}

/// Result of turning one upstream feature into a record.
enum Prepared {
    Record(FeatureRecord),
    Skipped(SkipReason),
    Invalid(ExternalId, FeatureStoreError),
}

fn prepare_record(class: FeatureClass, feature: SourceFeature) -> Prepared {
    let Some(external_id) = feature
        .id
        .and_then(|id| ExternalId::new(id.to_string()).ok())
    else {
        return Prepared::Skipped(SkipReason::MissingId);
    };
    let Some(raw_geometry) = feature.geometry.filter(|value| !value.is_null()) else {
        return Prepared::Skipped(SkipReason::MissingGeometry);
    };
    let geometry = match parse_interchange(raw_geometry) {
        Ok(geometry) => geometry,
        Err(source) => {
            let err = FeatureStoreError::Geometry {
                class,
                external_id: external_id.clone(),
                source,
            };
            return Prepared::Invalid(external_id, err);
        }
    };

    let mut attributes: Attributes = feature.properties.unwrap_or_default();
    class.apply_attribute_rules(&mut attributes);
    Prepared::Record(FeatureRecord::new(external_id, geometry, attributes))
}

/// Write a snapshot through `session`, one feature at a time.
///
/// Features without an id or geometry are skipped with a warning. A failed
/// write either ends the run with [`SyncError::Store`] (features written
/// before it stay written) or is recorded and passed over, depending on
/// `policy`.
///
/// # Examples
///
/// ```
/// use greenway_core::{FeatureClass, FeatureStore, test_support::MemoryFeatureStore};
/// use greenway_data::{FailurePolicy, SourceSnapshot, apply_snapshot};
/// use serde_json::json;
///
/// let snapshot: SourceSnapshot = serde_json::from_value(json!({
///     "features": [
///         {"id": 1, "geometry": {"type": "Point", "coordinates": [-80.84, 35.23]}},
///         {"geometry": {"type": "Point", "coordinates": [-80.85, 35.24]}}
///     ]
/// }))
/// .expect("valid snapshot");
///
/// let store = MemoryFeatureStore::default();
/// let mut session = store.session().expect("session");
/// let summary = apply_snapshot(&mut session, FeatureClass::Entrances, snapshot, FailurePolicy::Abort)
///     .expect("sync succeeds");
/// assert_eq!((summary.total, summary.upserted, summary.skipped.len()), (2, 1, 1));
/// ```
pub fn apply_snapshot<S>(
    session: &mut S,
    class: FeatureClass,
    snapshot: SourceSnapshot,
    policy: FailurePolicy,
) -> Result<SyncSummary, SyncError>
where
    S: FeatureSession + ?Sized,
{
    let mut summary = SyncSummary::new(class, snapshot.features.len());

    for (index, feature) in snapshot.features.into_iter().enumerate() {
        let outcome = match prepare_record(class, feature) {
            Prepared::Record(record) => session
                .upsert(class, &record)
                .map_err(|err| (record.external_id, err)),
            Prepared::Skipped(reason) => {
                warn!("skipping {class} feature #{index}: {reason:?}");
                summary.skipped.push(SkippedFeature { index, reason });
                continue;
            }
            Prepared::Invalid(external_id, err) => Err((external_id, err)),
        };

        match outcome {
            Ok(()) => summary.upserted += 1,
            Err((external_id, source)) => {
                warn!("failed to store {class} feature {external_id}: {source}");
                summary.failed.push(FailedFeature {
                    index,
                    external_id: external_id.clone(),
                    error: source.to_string(),
                });
                if policy == FailurePolicy::Abort {
                    return Err(SyncError::Store {
                        class,
                        external_id,
                        summary: Box::new(summary),
                        source,
                    });
                }
            }
        }
    }

    debug!(
        "{class} snapshot applied: {} upserted, {} skipped, {} failed",
        summary.upserted,
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenway_core::{FeatureStore, TRAIL_OWNER, test_support::MemoryFeatureStore};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> SourceSnapshot {
        serde_json::from_value(value).expect("valid snapshot")
    }

    fn point(id: serde_json::Value, lon: f64, lat: f64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "id": id,
            "geometry": {"type": "Point", "coordinates": [lon, lat]},
            "properties": {"Name": format!("feature {id}")}
        })
    }

    #[fixture]
    fn three_with_bad_second() -> SourceSnapshot {
        snapshot(json!({"features": [
            point(json!(1), -80.84, 35.23),
            point(json!(2), -80.84, 135.0),
            point(json!(3), -80.86, 35.25),
        ]}))
    }

    fn ids(store: &MemoryFeatureStore, class: FeatureClass) -> Vec<String> {
        store
            .records(class)
            .into_iter()
            .map(|record| record.external_id.to_string())
            .collect()
    }

    #[rstest]
    fn abort_keeps_earlier_writes(three_with_bad_second: SourceSnapshot) {
        let store = MemoryFeatureStore::default();
        let mut session = store.session().expect("session");
        let err = apply_snapshot(
            &mut session,
            FeatureClass::Entrances,
            three_with_bad_second,
            FailurePolicy::Abort,
        )
        .expect_err("second feature is out of range");

        let SyncError::Store {
            external_id,
            summary,
            source,
            ..
        } = err
        else {
            panic!("expected a store error");
        };
        assert_eq!(external_id.as_str(), "2");
        assert!(matches!(source, FeatureStoreError::Geometry { .. }));
        assert_eq!((summary.upserted, summary.failed.len()), (1, 1));
        assert_eq!(summary.unprocessed(), 1);
        assert_eq!(ids(&store, FeatureClass::Entrances), vec!["1"]);
    }

    #[rstest]
    fn skip_continues_past_failures(three_with_bad_second: SourceSnapshot) {
        let store = MemoryFeatureStore::default();
        let mut session = store.session().expect("session");
        let summary = apply_snapshot(
            &mut session,
            FeatureClass::Entrances,
            three_with_bad_second,
            FailurePolicy::Skip,
        )
        .expect("skip policy completes");
        assert_eq!((summary.total, summary.upserted), (3, 2));
        assert_eq!(
            summary.failed.iter().map(|f| f.index).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(ids(&store, FeatureClass::Entrances), vec!["1", "3"]);
    }

    #[rstest]
    fn integral_float_ids_update_the_integer_row() {
        let store = MemoryFeatureStore::default();
        for id in [json!(42), json!(42.0)] {
            let mut session = store.session().expect("session");
            apply_snapshot(
                &mut session,
                FeatureClass::MileMarkers,
                snapshot(json!({"features": [point(id, -80.84, 35.23)]})),
                FailurePolicy::Abort,
            )
            .expect("sync succeeds");
        }
        assert_eq!(ids(&store, FeatureClass::MileMarkers), vec!["42"]);
    }

    #[rstest]
    #[case(json!({"geometry": {"type": "Point", "coordinates": [0.0, 0.0]}}), SkipReason::MissingId)]
    #[case(json!({"id": "  ", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}}), SkipReason::MissingId)]
    #[case(json!({"id": 5, "geometry": null}), SkipReason::MissingGeometry)]
    fn incomplete_features_are_skipped(
        #[case] feature: serde_json::Value,
        #[case] reason: SkipReason,
    ) {
        let store = MemoryFeatureStore::default();
        let mut session = store.session().expect("session");
        let summary = apply_snapshot(
            &mut session,
            FeatureClass::MileMarkers,
            snapshot(json!({"features": [feature]})),
            FailurePolicy::Abort,
        )
        .expect("skips are not failures");
        assert_eq!(summary.skipped, vec![SkippedFeature { index: 0, reason }]);
        assert_eq!(store.writes(), 0);
    }

    #[rstest]
    fn malformed_geometry_is_a_feature_failure() {
        let store = MemoryFeatureStore::default();
        let mut session = store.session().expect("session");
        let summary = apply_snapshot(
            &mut session,
            FeatureClass::Entrances,
            snapshot(json!({"features": [{"id": 8, "geometry": {"type": "Circle"}}]})),
            FailurePolicy::Skip,
        )
        .expect("skip policy completes");
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.upserted, 0);
    }

    #[rstest]
    fn trails_get_the_owner_and_merged_lines() {
        let store = MemoryFeatureStore::default();
        let mut session = store.session().expect("session");
        apply_snapshot(
            &mut session,
            FeatureClass::Trails,
            snapshot(json!({"features": [{
                "id": 77,
                "geometry": {"type": "MultiLineString", "coordinates": [
                    [[-80.80, 35.20], [-80.81, 35.21]],
                    [[-80.81, 35.21], [-80.82, 35.22]]
                ]},
                "properties": {"trailowner": "Charlotte", "TrailName": "Sugar Creek"}
            }]})),
            FailurePolicy::Abort,
        )
        .expect("sync trails");

        let records = store.records(FeatureClass::Trails);
        let trail = records.first().expect("stored trail");
        assert_eq!(trail.attributes.get("trailowner"), Some(&json!(TRAIL_OWNER)));
        assert_eq!(trail.attributes.get("TrailName"), Some(&json!("Sugar Creek")));
        assert!(matches!(trail.geometry.value, geojson::Value::LineString(_)));
    }

    #[rstest]
    fn rejected_writes_are_reported_with_their_id() {
        let store = MemoryFeatureStore::default().reject_writes_for("2");
        let mut session = store.session().expect("session");
        let summary = apply_snapshot(
            &mut session,
            FeatureClass::Entrances,
            snapshot(json!({"features": [
                point(json!(1), -80.84, 35.23),
                point(json!(2), -80.85, 35.24),
            ]})),
            FailurePolicy::Skip,
        )
        .expect("skip policy completes");
        let failed = summary.failed.first().expect("one failure");
        assert_eq!(failed.external_id.as_str(), "2");
        assert!(failed.error.contains("rejected"));
    }

    #[rstest]
    fn in_progress_message_uses_the_label() {
        let err = SyncError::InProgress {
            class: FeatureClass::MileMarkers,
        };
        assert_eq!(err.to_string(), "mile markers sync already in progress");
        assert_eq!(err.class(), FeatureClass::MileMarkers);
        assert!(err.summary().is_none());
    }
}
