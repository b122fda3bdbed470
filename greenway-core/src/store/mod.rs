//! Storage seam for feature records.
//!
//! A [`FeatureStore`] hands out [`FeatureSession`]s. A session holds one
//! backend connection for its lifetime and gives it back when dropped, so a
//! sync run or a read keeps a single connection on every exit path.
//!
//! Stores own the spatial rules: [`normalise_for_storage`] validates the
//! geometry, tags it with SRID 4326 and merges trail parts before a row is
//! written.

use thiserror::Error;

use crate::{
    ExternalId, FeatureClass, FeatureRecord, GeometryError, ReferencedGeometry,
    geometry::prepare_for_storage,
};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::SCHEMA_VERSION;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteFeatureStore, SqliteFeatureStoreError, SqliteStoreOptions};

/// Errors surfaced by feature store implementations.
#[derive(Debug, Error)]
pub enum FeatureStoreError {
    /// The record geometry failed validation.
    #[error("{class} feature {external_id} has an invalid geometry")]
    Geometry {
        /// Class being written.
        class: FeatureClass,
        /// Record being written.
        external_id: ExternalId,
        /// Validation failure.
        #[source]
        source: GeometryError,
    },
    /// The backend refused the write.
    #[error("{class} feature {external_id} was rejected: {reason}")]
    Rejected {
        /// Class being written.
        class: FeatureClass,
        /// Record being written.
        external_id: ExternalId,
        /// Backend supplied reason.
        reason: String,
    },
    /// A stored row could not be turned back into a record.
    #[error("stored {class} row '{external_id}' is corrupt: {reason}")]
    CorruptRow {
        /// Class being read.
        class: FeatureClass,
        /// Raw key of the offending row.
        external_id: String,
        /// What was wrong with the row.
        reason: String,
    },
    /// No session could be acquired.
    #[error("feature store is unavailable: {reason}")]
    Unavailable {
        /// Why the store could not be reached.
        reason: String,
    },
    /// Errors raised by the SQLite backend.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    Sqlite(#[from] SqliteFeatureStoreError),
}

/// A unit of work holding one backend connection.
pub trait FeatureSession {
    /// Insert the record, or fully replace the stored row with the same
    /// external id.
    fn upsert(&mut self, class: FeatureClass, record: &FeatureRecord)
    -> Result<(), FeatureStoreError>;

    /// Read every stored record of a class. Order is unspecified.
    fn read_all(&mut self, class: FeatureClass) -> Result<Vec<FeatureRecord>, FeatureStoreError>;
}

/// Durable keyed storage of feature records, one table per class.
///
/// # Examples
///
/// ```
/// use geojson::{Geometry, Value};
/// use greenway_core::{
///     Attributes, ExternalId, FeatureClass, FeatureRecord, FeatureSession, FeatureStore,
///     test_support::MemoryFeatureStore,
/// };
///
/// # fn main() -> Result<(), greenway_core::FeatureStoreError> {
/// let store = MemoryFeatureStore::default();
/// let record = FeatureRecord::new(
///     ExternalId::new("1").expect("valid id"),
///     Geometry::new(Value::Point(vec![-80.84, 35.23])),
///     Attributes::new(),
/// );
/// let mut session = store.session()?;
/// session.upsert(FeatureClass::Entrances, &record)?;
/// assert_eq!(session.read_all(FeatureClass::Entrances)?, vec![record]);
/// # Ok(())
/// # }
/// ```
pub trait FeatureStore: Send + Sync {
    /// Session type borrowing the store.
    type Session<'s>: FeatureSession
    where
        Self: 's;

    /// Acquire a session. The connection is released when the session drops.
    fn session(&self) -> Result<Self::Session<'_>, FeatureStoreError>;
}

/// Apply the spatial write rules to a record's geometry.
pub fn normalise_for_storage(
    class: FeatureClass,
    record: &FeatureRecord,
) -> Result<ReferencedGeometry, FeatureStoreError> {
    prepare_for_storage(class, &record.geometry).map_err(|source| FeatureStoreError::Geometry {
        class,
        external_id: record.external_id.clone(),
        source,
    })
}
