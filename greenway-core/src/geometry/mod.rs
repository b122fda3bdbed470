//! Geometry normalisation applied before a feature reaches storage.
//!
//! Interchange geometries are parsed into [`geo`] shapes, validated against
//! the WGS84 coordinate envelope and tagged with [`WGS84_SRID`]. Trail
//! geometries additionally have their line parts merged, see
//! [`merge_lines`].
//!
//! Unmerged geometries keep their submitted positions, elevation included.
//! Merged trails are rebuilt from the two-dimensional shape.

mod convert;
mod merge;

use geo::Geometry;
use thiserror::Error;

use crate::FeatureClass;

pub use convert::{from_interchange, parse_interchange, to_interchange};
pub use merge::merge_lines;

/// Spatial reference identifier for WGS84 longitude/latitude.
pub const WGS84_SRID: u32 = 4326;

/// Errors raised while validating or normalising a geometry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// The value was not a GeoJSON geometry object.
    #[error("not a GeoJSON geometry: {message}")]
    Malformed {
        /// Parser diagnostic.
        message: String,
    },
    /// A position carried fewer than two ordinates.
    #[error("position has {found} ordinate(s); longitude and latitude are required")]
    ShortPosition {
        /// Number of ordinates present.
        found: usize,
    },
    /// An ordinate was NaN or infinite.
    #[error("position contains a non-finite ordinate")]
    NonFinite,
    /// Longitude outside `[-180, 180]`.
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// The rejected longitude.
        value: f64,
    },
    /// Latitude outside `[-90, 90]`.
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// The rejected latitude.
        value: f64,
    },
    /// A line string had fewer than two positions.
    #[error("line string has {found} position(s); at least 2 are required")]
    ShortLineString {
        /// Number of positions present.
        found: usize,
    },
    /// A polygon had no exterior ring.
    #[error("polygon has no rings")]
    EmptyPolygon,
    /// A polygon ring had fewer than four positions.
    #[error("polygon ring has {found} position(s); at least 4 are required")]
    ShortRing {
        /// Number of positions present.
        found: usize,
    },
    /// A polygon ring did not end where it started.
    #[error("polygon ring is not closed")]
    UnclosedRing,
    /// Line merging was requested for a non-linear geometry.
    #[error("cannot merge lines of a {kind} geometry")]
    UnsupportedMerge {
        /// Geometry type that was supplied.
        kind: &'static str,
    },
}

/// A validated shape together with its spatial reference.
///
/// # Examples
///
/// ```
/// use geojson::{Geometry, Value};
/// use greenway_core::{FeatureClass, WGS84_SRID, geometry::prepare_for_storage};
///
/// let input = Geometry::new(Value::Point(vec![-80.84, 35.23]));
/// let prepared = prepare_for_storage(FeatureClass::Entrances, &input).expect("valid point");
/// assert_eq!(prepared.srid(), WGS84_SRID);
/// assert_eq!(prepared.to_interchange(), input);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedGeometry {
    srid: u32,
    shape: Geometry<f64>,
    interchange: geojson::Geometry,
}

impl ReferencedGeometry {
    /// Tag a shape with the WGS84 reference system.
    #[must_use]
    pub fn wgs84(shape: Geometry<f64>) -> Self {
        let interchange = to_interchange(&shape);
        Self {
            srid: WGS84_SRID,
            shape,
            interchange,
        }
    }

    /// Tag a shape validated from `interchange`, keeping its positions as
    /// submitted. Bounding boxes and foreign members are not kept.
    fn wgs84_from(shape: Geometry<f64>, interchange: &geojson::Geometry) -> Self {
        Self {
            srid: WGS84_SRID,
            shape,
            interchange: geojson::Geometry::new(interchange.value.clone()),
        }
    }

    /// The spatial reference identifier.
    #[must_use]
    pub const fn srid(&self) -> u32 {
        self.srid
    }

    /// The validated shape.
    #[must_use]
    pub const fn shape(&self) -> &Geometry<f64> {
        &self.shape
    }

    /// The geometry in GeoJSON interchange form, as it is stored.
    #[must_use]
    pub fn to_interchange(&self) -> geojson::Geometry {
        self.interchange.clone()
    }
}

/// Validate an interchange geometry and apply the per-class rules.
///
/// Every class is tagged with [`WGS84_SRID`]; classes whose
/// [`FeatureClass::merges_lines`] is set have their line parts merged.
pub fn prepare_for_storage(
    class: FeatureClass,
    geometry: &geojson::Geometry,
) -> Result<ReferencedGeometry, GeometryError> {
    let shape = from_interchange(geometry)?;
    if class.merges_lines() {
        return merge_lines(shape).map(ReferencedGeometry::wgs84);
    }
    Ok(ReferencedGeometry::wgs84_from(shape, geometry))
}

pub(crate) const fn kind_name(shape: &Geometry<f64>) -> &'static str {
    match shape {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
