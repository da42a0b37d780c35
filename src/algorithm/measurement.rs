//! Numeric measurements of every geometry in a series.

use arrow_array::builder::Float64Builder;
use arrow_array::{Array, Float64Array};
use geo::{
    Area, CoordsIter, EuclideanDistance, EuclideanLength, FrechetDistance, Geometry,
    HausdorffDistance, Line, LineString, MultiPoint, Polygon, Rect,
};

use crate::chunked_array::ChunkedArray;
use crate::error::{GeoFrameError, Result};
use crate::geometry::GeometryInput;
use crate::series::{GeoSeries, DEFAULT_BOUNDS_CHUNK_SIZE};

/// Measurements over the active range of a [`GeoSeries`].
///
/// Every per-row measurement returns a [`Float64Array`] with a null for each null geometry.
#[derive(Debug, Clone, Copy)]
pub struct Measurement<'a> {
    series: &'a GeoSeries,
}

impl<'a> Measurement<'a> {
    pub fn new(series: &'a GeoSeries) -> Self {
        Self { series }
    }

    fn unary_float<F>(&self, op: F) -> Result<Float64Array>
    where
        F: Fn(&Geometry) -> Result<f64> + Sync + Send,
    {
        let chunks = self.series.active_geometry().try_map(|chunk| {
            let mut builder = Float64Builder::with_capacity(chunk.len());
            for i in 0..chunk.len() {
                if chunk.is_null(i) {
                    builder.append_null();
                } else {
                    let geom = crate::geometry::from_wkb(chunk.value(i))?;
                    builder.append_value(op(&geom)?);
                }
            }
            Ok(builder.finish())
        })?;
        ChunkedArray::try_new(chunks)?.concat_or(Float64Array::from(Vec::<f64>::new()))
    }

    /// Planar area. Zero for points and lines.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::algorithm::Measurement;
    /// use geoframe::GeoSeries;
    ///
    /// let series = GeoSeries::try_from_wkt(&["POLYGON((0 0,2 0,2 2,0 2,0 0))"], None).unwrap();
    /// let area = Measurement::new(&series).area().unwrap();
    /// assert_eq!(area.value(0), 4.0);
    /// ```
    pub fn area(&self) -> Result<Float64Array> {
        self.unary_float(|geom| Ok(geom.unsigned_area()))
    }

    /// Length of lines, or perimeter of polygons. Zero for points.
    pub fn length(&self) -> Result<Float64Array> {
        self.unary_float(|geom| Ok(length(geom)))
    }

    /// Minimum euclidean distance from every row to `other`.
    pub fn distance(&self, other: impl Into<GeometryInput>) -> Result<Float64Array> {
        let other = other.into().to_geo()?;
        self.unary_float(|geom| Ok(geom.euclidean_distance(&other)))
    }

    /// Discrete Fréchet distance from every row to `other`.
    ///
    /// With `densify`, each segment is split into segments of at most that fraction of its
    /// length before measuring. `densify` must be in `(0, 1]`.
    pub fn frechet_distance(
        &self,
        other: impl Into<GeometryInput>,
        densify: Option<f64>,
    ) -> Result<Float64Array> {
        let parts = densify_parts(densify)?;
        let other = vertex_path(&other.into().to_geo()?, parts);
        self.unary_float(|geom| Ok(vertex_path(geom, parts).frechet_distance(&other)))
    }

    /// Discrete Hausdorff distance from every row to `other`, densified like
    /// [`Measurement::frechet_distance`].
    pub fn hausdorff_distance(
        &self,
        other: impl Into<GeometryInput>,
        densify: Option<f64>,
    ) -> Result<Float64Array> {
        let parts = densify_parts(densify)?;
        let other = MultiPoint::from(vertex_path(&other.into().to_geo()?, parts).into_points());
        self.unary_float(|geom| {
            let points = MultiPoint::from(vertex_path(geom, parts).into_points());
            if points.0.is_empty() || other.0.is_empty() {
                return Ok(f64::NAN);
            }
            Ok(points.hausdorff_distance(&other))
        })
    }

    /// Per-row `[xmin, ymin, xmax, ymax]`. Null and empty geometries give `NaN`.
    pub fn bounds(&self) -> Result<Vec<[f64; 4]>> {
        Ok(self
            .series
            .bounding_rects()?
            .into_iter()
            .map(|maybe_rect| match maybe_rect {
                Some(rect) => [rect.min().x, rect.min().y, rect.max().x, rect.max().y],
                None => [f64::NAN; 4],
            })
            .collect())
    }

    /// Bounding rectangle of the whole active range.
    pub fn total_bounds(&self) -> Result<Option<Rect>> {
        self.series.total_bounds(DEFAULT_BOUNDS_CHUNK_SIZE)
    }

    /// Smallest distance a vertex can move before the geometry becomes invalid. Infinity when
    /// no such distance exists, e.g. for a single point.
    #[cfg(feature = "geos")]
    pub fn minimum_clearance(&self) -> Result<Float64Array> {
        self.unary_float(crate::algorithm::geos::minimum_clearance)
    }
}

fn length(geom: &Geometry) -> f64 {
    match geom {
        Geometry::Line(l) => l.euclidean_length(),
        Geometry::LineString(ls) => ls.euclidean_length(),
        Geometry::MultiLineString(mls) => mls.euclidean_length(),
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => segments(geom).iter().map(|l| l.euclidean_length()).sum(),
        Geometry::GeometryCollection(gc) => gc.iter().map(length).sum(),
        Geometry::Point(_) | Geometry::MultiPoint(_) => 0.,
    }
}

/// Every segment of a geometry, ring by ring.
pub(crate) fn segments(geom: &Geometry) -> Vec<Line> {
    fn polygon_segments(polygon: &Polygon) -> impl Iterator<Item = Line> + '_ {
        polygon
            .exterior()
            .lines()
            .chain(polygon.interiors().iter().flat_map(|ring| ring.lines()))
    }

    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
        Geometry::Line(l) => vec![*l],
        Geometry::LineString(ls) => ls.lines().collect(),
        Geometry::MultiLineString(mls) => mls.iter().flat_map(|ls| ls.lines()).collect(),
        Geometry::Polygon(p) => polygon_segments(p).collect(),
        Geometry::MultiPolygon(mp) => mp.iter().flat_map(polygon_segments).collect(),
        Geometry::Rect(r) => polygon_segments(&r.to_polygon()).collect(),
        Geometry::Triangle(t) => polygon_segments(&t.to_polygon()).collect(),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(segments).collect(),
    }
}

fn densify_parts(densify: Option<f64>) -> Result<usize> {
    match densify {
        None => Ok(1),
        Some(fraction) if fraction > 0. && fraction <= 1. => Ok((1. / fraction).ceil() as usize),
        Some(fraction) => Err(GeoFrameError::General(format!(
            "densify fraction must be in (0, 1], got {fraction}"
        ))),
    }
}

/// Vertices of a geometry in order, with every segment split into `parts` pieces.
fn vertex_path(geom: &Geometry, parts: usize) -> LineString {
    if parts <= 1 {
        return geom.coords_iter().collect();
    }
    let mut coords = Vec::with_capacity(geom.coords_count() * parts);
    let mut last_end = None;
    for line in segments(geom) {
        if last_end != Some(line.start) {
            coords.push(line.start);
        }
        for step in 1..=parts {
            let t = step as f64 / parts as f64;
            coords.push(line.start + line.delta() * t);
        }
        last_end = Some(line.end);
    }
    if coords.is_empty() {
        // Points have no segments
        coords.extend(geom.coords_iter());
    }
    LineString::new(coords)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::series::{line_series, point_series, polygon_series};
    use approx::assert_relative_eq;
    use geo::line_string;

    #[test]
    fn area_and_length() {
        let series = polygon_series();
        let measurement = Measurement::new(&series);
        let area = measurement.area().unwrap();
        assert_eq!(area.value(0), 4.0);
        assert_eq!(area.value(1), 4.0);
        assert!(area.is_null(2));

        let length = measurement.length().unwrap();
        assert_eq!(length.value(0), 8.0);

        let lines = line_series();
        let length = Measurement::new(&lines).length().unwrap();
        assert_relative_eq!(length.value(0), 2.0 * 2f64.sqrt());
        assert_relative_eq!(length.value(1), 4.0);
    }

    #[test]
    fn distance_to_point() {
        let series = point_series();
        let distance = Measurement::new(&series).distance("POINT(0 3)").unwrap();
        assert_eq!(distance.len(), 5);
        assert_relative_eq!(distance.value(0), 3.0);
        assert_relative_eq!(distance.value(3), 3.0);
    }

    #[test]
    fn hausdorff_and_frechet() {
        let series = line_series();
        let measurement = Measurement::new(&series);
        let other = "LINESTRING(0 0,2 2)";
        let hausdorff = measurement.hausdorff_distance(other, None).unwrap();
        assert_relative_eq!(hausdorff.value(0), 0.0);
        let frechet = measurement.frechet_distance(other, Some(0.5)).unwrap();
        assert_relative_eq!(frechet.value(0), 0.0);
        assert!(measurement.frechet_distance(other, Some(0.0)).is_err());
        assert!(measurement.hausdorff_distance(other, Some(1.5)).is_err());
    }

    #[test]
    fn densified_path() {
        let geom: Geometry = line_string![(x: 0., y: 0.), (x: 4., y: 0.)].into();
        let path = vertex_path(&geom, 4);
        assert_eq!(path.0.len(), 5);
        assert_eq!(path.0[1], geo::coord! { x: 1., y: 0. });
    }

    #[test]
    fn bounds_rows() {
        let series = polygon_series();
        let bounds = Measurement::new(&series).bounds().unwrap();
        assert_eq!(bounds[0], [0., 0., 2., 2.]);
        assert!(bounds[2].iter().all(|v| v.is_nan()));
        let total = Measurement::new(&series).total_bounds().unwrap().unwrap();
        assert_eq!(total.max(), geo::coord! { x: 4., y: 4. });
    }
}
