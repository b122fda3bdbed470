//! Core domain types for Greenway Explorer.
//!
//! The crate models the three greenway feature classes, the records synced
//! from the county GIS service, and the storage seam those records flow
//! through. Geometry is normalised here before it reaches any backend:
//! positions are validated, every shape is tagged with SRID 4326, and trail
//! parts are merged into continuous lines.

#![forbid(unsafe_code)]

mod feature_class;
pub mod geometry;
mod record;
pub mod store;
#[doc(hidden)]
pub mod test_support;

pub use feature_class::{FeatureClass, ParseFeatureClassError, TRAIL_OWNER, TRAIL_OWNER_FIELD};
pub use geometry::{GeometryError, ReferencedGeometry, WGS84_SRID};
pub use record::{Attributes, ExternalId, ExternalIdError, FeatureRecord};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteFeatureStore, SqliteFeatureStoreError, SqliteStoreOptions};
pub use store::{FeatureSession, FeatureStore, FeatureStoreError};
