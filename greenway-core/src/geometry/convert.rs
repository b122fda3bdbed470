//! Conversion between GeoJSON interchange geometries and [`geo`] shapes.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use geojson::{Position, Value};

use super::GeometryError;

/// Decode a raw JSON value into an interchange geometry.
///
/// Only the GeoJSON structure is checked here; coordinates are validated by
/// [`from_interchange`].
///
/// ```
/// use greenway_core::{GeometryError, geometry::parse_interchange};
/// use serde_json::json;
///
/// assert!(parse_interchange(json!({"type": "Point", "coordinates": [1.0, 2.0]})).is_ok());
/// assert!(matches!(
///     parse_interchange(json!({"type": "Circle", "radius": 3})),
///     Err(GeometryError::Malformed { .. })
/// ));
/// ```
pub fn parse_interchange(value: serde_json::Value) -> Result<geojson::Geometry, GeometryError> {
    serde_json::from_value(value).map_err(|err| GeometryError::Malformed {
        message: err.to_string(),
    })
}

/// Parse and validate an interchange geometry.
///
/// Ordinates beyond longitude and latitude (elevation, measures) are
/// discarded.
///
/// ```
/// use geojson::{Geometry, Value};
/// use greenway_core::geometry::from_interchange;
///
/// let shape = from_interchange(&Geometry::new(Value::Point(vec![-80.84, 35.23, 210.0])))
///     .expect("valid point");
/// assert!(matches!(shape, geo::Geometry::Point(_)));
/// ```
pub fn from_interchange(geometry: &geojson::Geometry) -> Result<Geometry<f64>, GeometryError> {
    shape_from_value(&geometry.value)
}

fn shape_from_value(value: &Value) -> Result<Geometry<f64>, GeometryError> {
    let shape = match value {
        Value::Point(position) => Geometry::Point(Point::from(coord(position)?)),
        Value::MultiPoint(positions) => {
            let points = positions
                .iter()
                .map(|position| coord(position).map(Point::from))
                .collect::<Result<Vec<_>, _>>()?;
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        Value::LineString(positions) => Geometry::LineString(line_string(positions)?),
        Value::MultiLineString(lines) => {
            let parts = lines
                .iter()
                .map(|positions| line_string(positions))
                .collect::<Result<Vec<_>, _>>()?;
            Geometry::MultiLineString(MultiLineString::new(parts))
        }
        Value::Polygon(rings) => Geometry::Polygon(polygon(rings)?),
        Value::MultiPolygon(polygons) => {
            let parts = polygons
                .iter()
                .map(|rings| polygon(rings))
                .collect::<Result<Vec<_>, _>>()?;
            Geometry::MultiPolygon(MultiPolygon::new(parts))
        }
        Value::GeometryCollection(members) => {
            let shapes = members
                .iter()
                .map(|member| shape_from_value(&member.value))
                .collect::<Result<Vec<_>, _>>()?;
            Geometry::GeometryCollection(GeometryCollection(shapes))
        }
    };
    Ok(shape)
}

fn coord(position: &[f64]) -> Result<Coord<f64>, GeometryError> {
    let [x, y, ..] = position else {
        return Err(GeometryError::ShortPosition {
            found: position.len(),
        });
    };
    if !x.is_finite() || !y.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    if !(-180.0..=180.0).contains(x) {
        return Err(GeometryError::LongitudeOutOfRange { value: *x });
    }
    if !(-90.0..=90.0).contains(y) {
        return Err(GeometryError::LatitudeOutOfRange { value: *y });
    }
    Ok(Coord { x: *x, y: *y })
}

fn coords(positions: &[Position]) -> Result<Vec<Coord<f64>>, GeometryError> {
    positions.iter().map(|position| coord(position)).collect()
}

fn line_string(positions: &[Position]) -> Result<LineString<f64>, GeometryError> {
    if positions.len() < 2 {
        return Err(GeometryError::ShortLineString {
            found: positions.len(),
        });
    }
    coords(positions).map(LineString::new)
}

fn ring(positions: &[Position]) -> Result<LineString<f64>, GeometryError> {
    if positions.len() < 4 {
        return Err(GeometryError::ShortRing {
            found: positions.len(),
        });
    }
    let ring = LineString::new(coords(positions)?);
    if !ring.is_closed() {
        return Err(GeometryError::UnclosedRing);
    }
    Ok(ring)
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>, GeometryError> {
    let (exterior, interiors) = rings.split_first().ok_or(GeometryError::EmptyPolygon)?;
    let interiors = interiors
        .iter()
        .map(|positions| ring(positions))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(ring(exterior)?, interiors))
}

/// Render a shape in GeoJSON interchange form.
///
/// `Line`, `Rect` and `Triangle` have no interchange counterpart and are
/// written as a line string or polygon respectively.
#[must_use]
pub fn to_interchange(shape: &Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(value_from_shape(shape))
}

fn value_from_shape(shape: &Geometry<f64>) -> Value {
    match shape {
        Geometry::Point(point) => Value::Point(position(point.0)),
        Geometry::Line(line) => Value::LineString(vec![position(line.start), position(line.end)]),
        Geometry::LineString(line) => Value::LineString(positions(line)),
        Geometry::Polygon(polygon) => Value::Polygon(polygon_rings(polygon)),
        Geometry::MultiPoint(points) => {
            Value::MultiPoint(points.iter().map(|point| position(point.0)).collect())
        }
        Geometry::MultiLineString(lines) => {
            Value::MultiLineString(lines.iter().map(positions).collect())
        }
        Geometry::MultiPolygon(polygons) => {
            Value::MultiPolygon(polygons.iter().map(polygon_rings).collect())
        }
        Geometry::GeometryCollection(collection) => Value::GeometryCollection(
            collection.iter().map(to_interchange).collect(),
        ),
        Geometry::Rect(rect) => Value::Polygon(polygon_rings(&rect.to_polygon())),
        Geometry::Triangle(triangle) => Value::Polygon(polygon_rings(&triangle.to_polygon())),
    }
}

fn position(coord: Coord<f64>) -> Position {
    vec![coord.x, coord.y]
}

fn positions(line: &LineString<f64>) -> Vec<Position> {
    line.coords().copied().map(position).collect()
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(positions)
        .collect()
}
