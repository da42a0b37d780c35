//! Conversions between WKB, WKT and [`geo::Geometry`], and the geometry type ids used by
//! [`has_type`](crate::algorithm::Predicates::has_type).

use geo::Geometry;
use geozero::wkb::Wkb;
use geozero::wkt::WktStr;
use geozero::{CoordDimensions, ToGeo, ToWkb, ToWkt};

use crate::error::{GeoFrameError, Result};

/// Parse a WKB buffer into a [`geo::Geometry`].
pub fn from_wkb(buf: &[u8]) -> Result<Geometry> {
    Ok(Wkb(buf.to_vec()).to_geo()?)
}

/// Parse a WKT string into a [`geo::Geometry`].
pub fn from_wkt(wkt: &str) -> Result<Geometry> {
    Ok(WktStr(wkt).to_geo()?)
}

/// Encode a geometry as 2D WKB.
pub fn to_wkb(geom: &Geometry) -> Result<Vec<u8>> {
    Ok(geom.to_wkb(CoordDimensions::xy())?)
}

/// Encode a geometry as WKT.
pub fn to_wkt(geom: &Geometry) -> Result<String> {
    Ok(geom.to_wkt()?)
}

/// A geometry argument in any of the accepted encodings.
///
/// Predicates and measurements compare every row against one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryInput {
    Wkt(String),
    Wkb(Vec<u8>),
    Geo(Geometry),
}

impl GeometryInput {
    /// Decode into a [`geo::Geometry`].
    pub fn to_geo(&self) -> Result<Geometry> {
        match self {
            GeometryInput::Wkt(wkt) => from_wkt(wkt),
            GeometryInput::Wkb(wkb) => from_wkb(wkb),
            GeometryInput::Geo(geom) => Ok(geom.clone()),
        }
    }
}

impl From<&str> for GeometryInput {
    fn from(value: &str) -> Self {
        GeometryInput::Wkt(value.to_string())
    }
}

impl From<String> for GeometryInput {
    fn from(value: String) -> Self {
        GeometryInput::Wkt(value)
    }
}

impl From<&[u8]> for GeometryInput {
    fn from(value: &[u8]) -> Self {
        GeometryInput::Wkb(value.to_vec())
    }
}

impl From<Vec<u8>> for GeometryInput {
    fn from(value: Vec<u8>) -> Self {
        GeometryInput::Wkb(value)
    }
}

impl From<Geometry> for GeometryInput {
    fn from(value: Geometry) -> Self {
        GeometryInput::Geo(value)
    }
}

macro_rules! impl_from_geo {
    ($geo_type:ty, $variant:path) => {
        impl From<$geo_type> for GeometryInput {
            fn from(value: $geo_type) -> Self {
                GeometryInput::Geo($variant(value))
            }
        }
    };
}

impl_from_geo!(geo::Point, Geometry::Point);
impl_from_geo!(geo::LineString, Geometry::LineString);
impl_from_geo!(geo::Polygon, Geometry::Polygon);
impl_from_geo!(geo::MultiPoint, Geometry::MultiPoint);
impl_from_geo!(geo::MultiLineString, Geometry::MultiLineString);
impl_from_geo!(geo::MultiPolygon, Geometry::MultiPolygon);
impl_from_geo!(geo::Rect, Geometry::Rect);

/// Geometry type ids, numbered as in GEOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i8)]
pub enum GeometryType {
    Point = 0,
    LineString = 1,
    LinearRing = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    /// The type of a decoded geometry.
    ///
    /// `Line` counts as a line string, `Rect` and `Triangle` as polygons. WKB never encodes a
    /// linear ring, so [`GeometryType::LinearRing`] is never returned.
    pub fn of(geom: &Geometry) -> Self {
        match geom {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// The numeric id of this type.
    pub fn id(&self) -> i8 {
        *self as i8
    }
}

impl TryFrom<i8> for GeometryType {
    type Error = GeoFrameError;

    fn try_from(value: i8) -> Result<Self> {
        match value {
            0 => Ok(GeometryType::Point),
            1 => Ok(GeometryType::LineString),
            2 => Ok(GeometryType::LinearRing),
            3 => Ok(GeometryType::Polygon),
            4 => Ok(GeometryType::MultiPoint),
            5 => Ok(GeometryType::MultiLineString),
            6 => Ok(GeometryType::MultiPolygon),
            7 => Ok(GeometryType::GeometryCollection),
            _ => Err(GeoFrameError::IncorrectType(
                format!("Unknown geometry type id {value}").into(),
            )),
        }
    }
}
