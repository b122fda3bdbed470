//! Data acquisition and synchronisation for Greenway Explorer.
//!
//! - [`source`] fetches feature snapshots from the county GIS services.
//! - [`sync`] reconciles a snapshot into a
//!   [`FeatureStore`](greenway_core::FeatureStore) with per-class leases and
//!   an explicit failure policy.
//! - [`read`] assembles stored records back into feature collections.
//! - [`FeatureService`] ties the three together for the HTTP and CLI
//!   surfaces.

#![forbid(unsafe_code)]

pub mod read;
mod service;
pub mod source;
pub mod sync;

pub use read::{ReadError, read_feature_collection};
pub use service::FeatureService;
pub use source::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, FeatureSource, FeatureSources, HttpFeatureSource,
    HttpFeatureSourceConfig, SourceBuildError, SourceError, SourceErrorKind, SourceSnapshot,
    default_source_url,
};
pub use sync::{
    FailedFeature, FailurePolicy, ParseFailurePolicyError, SkipReason, SkippedFeature, SyncError,
    SyncLease, SyncLeases, SyncSummary, apply_snapshot,
};
