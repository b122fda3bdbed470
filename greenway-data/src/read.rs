//! Assembling stored records into GeoJSON feature collections.

use geojson::FeatureCollection;
use greenway_core::{FeatureClass, FeatureRecord, FeatureSession, FeatureStore, FeatureStoreError};
use thiserror::Error;

/// Errors raised while reading a feature class.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The store could not be read.
    #[error("failed to read {class} from the store")]
    Store {
        /// Class being read.
        class: FeatureClass,
        /// Store failure.
        #[source]
        source: FeatureStoreError,
    },
    /// The blocking read task did not complete.
    #[error("{class} read worker did not complete")]
    Worker {
        /// Class being read.
        class: FeatureClass,
        /// Join failure.
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Read every stored record of `class` as a feature collection.
///
/// Each feature's id is the record's external id and its properties are the
/// stored attributes verbatim. An empty class yields an empty collection.
///
/// ```
/// use greenway_core::{FeatureClass, test_support::MemoryFeatureStore};
/// use greenway_data::read_feature_collection;
///
/// let store = MemoryFeatureStore::default();
/// let collection = read_feature_collection(&store, FeatureClass::Trails).expect("read trails");
/// assert_eq!(
///     serde_json::to_value(&collection).expect("serialise"),
///     serde_json::json!({"type": "FeatureCollection", "features": []})
/// );
/// ```
pub fn read_feature_collection<S>(
    store: &S,
    class: FeatureClass,
) -> Result<FeatureCollection, ReadError>
where
    S: FeatureStore,
{
    let to_error = |source| ReadError::Store { class, source };
    let records = store
        .session()
        .and_then(|mut session| session.read_all(class))
        .map_err(to_error)?;

    Ok(FeatureCollection {
        bbox: None,
        features: records.into_iter().map(FeatureRecord::into_feature).collect(),
        foreign_members: None,
    })
}
