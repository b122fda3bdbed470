//! Feature records as they travel between the upstream source, the store and
//! API consumers.

use std::fmt;

use geojson::{Feature, feature::Id};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema-less attribute bag attached to every feature.
pub type Attributes = geojson::JsonObject;

/// Stable identifier assigned to a feature by the upstream service.
///
/// Identifiers are unique within a feature class and form the primary key of
/// the class table. Blank identifiers are rejected.
///
/// # Examples
///
/// ```
/// use greenway_core::ExternalId;
///
/// let id = ExternalId::new("42").expect("valid id");
/// assert_eq!(id.as_str(), "42");
/// assert!(ExternalId::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

/// Errors returned by [`ExternalId::new`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalIdError {
    /// The identifier was empty or whitespace.
    #[error("external id must not be blank")]
    Blank,
}

impl ExternalId {
    /// Validates and constructs an [`ExternalId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ExternalIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ExternalIdError::Blank);
        }
        Ok(Self(value))
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = ExternalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalId> for String {
    fn from(value: ExternalId) -> Self {
        value.0
    }
}

/// One feature of a class: identifier, interchange geometry and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Upstream identifier.
    pub external_id: ExternalId,
    /// Geometry in GeoJSON interchange form.
    pub geometry: geojson::Geometry,
    /// Attributes passed through from the upstream feature.
    pub attributes: Attributes,
}

impl FeatureRecord {
    /// Construct a record from its parts.
    #[must_use]
    pub const fn new(
        external_id: ExternalId,
        geometry: geojson::Geometry,
        attributes: Attributes,
    ) -> Self {
        Self {
            external_id,
            geometry,
            attributes,
        }
    }

    /// Convert the record into a GeoJSON feature whose id is the external id.
    ///
    /// ```
    /// use geojson::{Geometry, Value, feature::Id};
    /// use greenway_core::{Attributes, ExternalId, FeatureRecord};
    ///
    /// let record = FeatureRecord::new(
    ///     ExternalId::new("7").expect("valid id"),
    ///     Geometry::new(Value::Point(vec![-80.84, 35.23])),
    ///     Attributes::new(),
    /// );
    /// let feature = record.into_feature();
    /// assert_eq!(feature.id, Some(Id::String("7".into())));
    /// assert!(feature.properties.is_some());
    /// ```
    #[must_use]
    pub fn into_feature(self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(self.geometry),
            id: Some(Id::String(self.external_id.into())),
            properties: Some(self.attributes),
            foreign_members: None,
        }
    }
}
