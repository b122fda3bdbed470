//! Facade crate for the Greenway trail data service.
//!
//! Re-exports the feature model and store traits from `greenway-core` and
//! the sync and read operations from `greenway-data`. The SQLite store sits
//! behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use greenway_core::{
    Attributes, ExternalId, ExternalIdError, FeatureClass, FeatureRecord, FeatureSession,
    FeatureStore, FeatureStoreError, GeometryError, ParseFeatureClassError, ReferencedGeometry,
    TRAIL_OWNER, TRAIL_OWNER_FIELD, WGS84_SRID,
};

#[cfg(feature = "store-sqlite")]
pub use greenway_core::{SqliteFeatureStore, SqliteFeatureStoreError, SqliteStoreOptions};

pub use greenway_data::{
    FailurePolicy, FeatureService, FeatureSource, FeatureSources, HttpFeatureSource,
    HttpFeatureSourceConfig, ReadError, SourceError, SourceErrorKind, SourceSnapshot, SyncError,
    SyncSummary, apply_snapshot, read_feature_collection,
};
