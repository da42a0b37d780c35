//! The geometry column of a [`GeoDataFrame`](crate::GeoDataFrame).

use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::{Array, BinaryArray, BooleanArray, UInt32Array};
use geo::{BoundingRect, ConvexHull, CoordsIter, Geometry, MultiPoint, Point, Polygon, Rect};
use tracing::debug;

use crate::algorithm::aggregate::{convex_hull_all, total_bounds};
#[cfg(not(feature = "geos"))]
use crate::algorithm::aggregate::union_all;
use crate::chunked_array::ChunkedArray;
use crate::error::{GeoFrameError, Result};
use crate::geometry::{from_wkb, from_wkt, to_wkb, to_wkt};

/// Default number of rows per chunk for [`GeoSeries::total_bounds`].
pub const DEFAULT_BOUNDS_CHUNK_SIZE: usize = 1_000_000;

/// Default number of rows per chunk for [`GeoSeries::convex_hull_all`].
pub const DEFAULT_HULL_CHUNK_SIZE: usize = 50_000;

/// A chunked column of WKB geometries with an optional CRS and an active range.
///
/// The active range `[start, end)` restricts every operation to a window of the underlying data
/// without copying. [`GeoSeries::trim`] materializes that window.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSeries {
    geometry: ChunkedArray<BinaryArray>,
    crs: Option<String>,
    index_start: usize,
    index_end: usize,
}

impl GeoSeries {
    /// Create a series over WKB chunks, with the whole data active.
    pub fn new(geometry: ChunkedArray<BinaryArray>, crs: Option<String>) -> Self {
        let index_end = geometry.len();
        Self {
            geometry,
            crs,
            index_start: 0,
            index_end,
        }
    }

    /// Create a single-chunk series from a WKB array.
    pub fn from_wkb_array(array: BinaryArray, crs: Option<String>) -> Self {
        Self::new(ChunkedArray::new(vec![array]), crs)
    }

    /// Encode geometries as WKB. `None` entries become nulls.
    ///
    /// # Examples
    ///
    /// ```
    /// use geo::point;
    /// use geoframe::GeoSeries;
    ///
    /// let series = GeoSeries::try_from_geometries(
    ///     &[Some(point!(x: 0., y: 1.).into()), None],
    ///     Some("EPSG:4326".to_string()),
    /// )
    /// .unwrap();
    /// assert_eq!(series.len(), 2);
    /// assert!(series.value(1).unwrap().is_none());
    /// ```
    pub fn try_from_geometries(geoms: &[Option<Geometry>], crs: Option<String>) -> Result<Self> {
        let wkb = geoms
            .iter()
            .map(|maybe_geom| maybe_geom.as_ref().map(to_wkb).transpose())
            .collect::<Result<Vec<_>>>()?;
        let array: BinaryArray = wkb.into_iter().collect();
        Ok(Self::from_wkb_array(array, crs))
    }

    /// Parse WKT strings into a series.
    pub fn try_from_wkt(wkt: &[&str], crs: Option<String>) -> Result<Self> {
        let geoms = wkt
            .iter()
            .map(|s| from_wkt(s).map(Some))
            .collect::<Result<Vec<_>>>()?;
        Self::try_from_geometries(&geoms, crs)
    }

    /// Number of rows in the active range.
    pub fn len(&self) -> usize {
        self.index_end - self.index_start
    }

    /// Returns true if the active range is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows of the underlying data, ignoring the active range.
    pub fn length_original(&self) -> usize {
        self.geometry.len()
    }

    /// Share of the underlying rows inside the active range.
    pub fn active_fraction(&self) -> f64 {
        match self.length_original() {
            0 => 1.0,
            n => self.len() as f64 / n as f64,
        }
    }

    /// The coordinate reference system, e.g. `EPSG:4326`.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Replace the CRS label without touching coordinates.
    pub fn set_crs(&mut self, crs: Option<String>) {
        self.crs = crs;
    }

    pub fn get_active_range(&self) -> (usize, usize) {
        (self.index_start, self.index_end)
    }

    /// Restrict the series to rows `i1..i2` of the underlying data.
    pub fn set_active_range(&mut self, i1: usize, i2: usize) -> Result<()> {
        if i1 > i2 || i2 > self.length_original() {
            return Err(GeoFrameError::InvalidRange {
                start: i1,
                end: i2,
                len: self.length_original(),
            });
        }
        self.index_start = i1;
        self.index_end = i2;
        Ok(())
    }

    /// The active range as a chunked array.
    pub fn active_geometry(&self) -> ChunkedArray<BinaryArray> {
        if self.index_start == 0 && self.index_end == self.length_original() {
            self.geometry.clone()
        } else {
            self.geometry.slice(self.index_start, self.len())
        }
    }

    /// The underlying data, ignoring the active range.
    pub fn raw_geometry(&self) -> &ChunkedArray<BinaryArray> {
        &self.geometry
    }

    /// A new series whose underlying data is exactly the active range.
    pub fn trim(&self) -> Self {
        Self::new(self.active_geometry(), self.crs.clone())
    }

    fn check_index(&self, i: usize) -> Result<usize> {
        if i >= self.len() {
            return Err(GeoFrameError::OutOfRange {
                index: i,
                len: self.len(),
            });
        }
        Ok(self.index_start + i)
    }

    /// Raw WKB of active row `i`, `None` if the row is null.
    pub fn wkb(&self, i: usize) -> Result<Option<&[u8]>> {
        let index = self.check_index(i)?;
        let (chunk_idx, offset) = self
            .geometry
            .locate(index)
            .ok_or(GeoFrameError::OutOfRange {
                index: i,
                len: self.len(),
            })?;
        let chunk = &self.geometry.chunks()[chunk_idx];
        if chunk.is_null(offset) {
            Ok(None)
        } else {
            Ok(Some(chunk.value(offset)))
        }
    }

    /// Geometry of active row `i`, `None` if the row is null.
    pub fn value(&self, i: usize) -> Result<Option<Geometry>> {
        self.wkb(i)?.map(from_wkb).transpose()
    }

    /// Slice with Python semantics: negative bounds count from the end and `stop` is clamped to
    /// the length. The result is trimmed.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::GeoSeries;
    ///
    /// let series = GeoSeries::try_from_wkt(&["POINT(0 0)", "POINT(1 1)", "POINT(2 2)"], None).unwrap();
    /// let tail = series.slice(-2, None);
    /// assert_eq!(tail.len(), 2);
    /// assert_eq!(tail.get_active_range(), (0, 2));
    /// ```
    pub fn slice(&self, start: isize, stop: Option<isize>) -> Self {
        let len = self.len() as isize;
        let resolve = |bound: isize| -> usize {
            let bound = if bound < 0 { len + bound } else { bound };
            bound.clamp(0, len) as usize
        };
        let start = resolve(start);
        let stop = resolve(stop.unwrap_or(len)).max(start);
        Self::new(
            self.geometry.slice(self.index_start + start, stop - start),
            self.crs.clone(),
        )
    }

    /// Split the active range into zero-copy chunks of at most `chunk_size` rows.
    ///
    /// Pieces never span two underlying chunks, so a chunk boundary inside a window of
    /// `chunk_size` rows yields two shorter pieces.
    pub fn chunked(&self, chunk_size: usize) -> Vec<BinaryArray> {
        let chunk_size = chunk_size.max(1);
        let active = self.active_geometry();
        let mut output = Vec::with_capacity(self.len() / chunk_size + active.num_chunks());
        for chunk in active.chunks() {
            let mut lower = 0;
            while lower < chunk.len() {
                let length = chunk_size.min(chunk.len() - lower);
                output.push(chunk.slice(lower, length));
                lower += length;
            }
        }
        output
    }

    /// The active range rechunked to at most `chunk_size` rows per chunk.
    pub fn rechunk(&self, chunk_size: usize) -> Result<ChunkedArray<BinaryArray>> {
        ChunkedArray::try_new(self.chunked(chunk_size))
    }

    /// The active range as a single WKB array.
    pub fn to_wkb_array(&self) -> Result<BinaryArray> {
        let active = self.active_geometry();
        match active.num_chunks() {
            0 => Ok(BinaryArray::from(Vec::<Option<&[u8]>>::new())),
            1 => Ok(active.chunks()[0].clone()),
            _ => Ok(active.concat()?.as_binary::<i32>().clone()),
        }
    }

    /// Gather rows by active index. Null indices produce null geometries.
    ///
    /// # Examples
    ///
    /// ```
    /// use arrow_array::UInt32Array;
    /// use geoframe::GeoSeries;
    ///
    /// let series = GeoSeries::try_from_wkt(&["POINT(0 0)", "POINT(1 1)", "POINT(2 2)"], None).unwrap();
    /// let taken = series.take(&UInt32Array::from(vec![Some(2), None, Some(0)])).unwrap();
    /// assert_eq!(taken.len(), 3);
    /// assert!(taken.value(1).unwrap().is_none());
    /// assert!(series.take(&UInt32Array::from(vec![3])).is_err());
    /// ```
    pub fn take(&self, indices: &UInt32Array) -> Result<Self> {
        if let Some(index) = indices
            .iter()
            .flatten()
            .find(|index| *index as usize >= self.len())
        {
            return Err(GeoFrameError::OutOfRange {
                index: index as usize,
                len: self.len(),
            });
        }

        let values = self.to_wkb_array()?;
        let taken = arrow::compute::take(&values, indices, None)?;
        Ok(Self::from_wkb_array(
            taken.as_binary::<i32>().clone(),
            self.crs.clone(),
        ))
    }

    /// Keep the active rows where `mask` is true. Null mask entries drop the row.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(GeoFrameError::LengthMismatch {
                expected: self.len(),
                actual: mask.len(),
            });
        }
        let values = self.to_wkb_array()?;
        let filtered = arrow::compute::filter(&values, mask)?;
        Ok(Self::from_wkb_array(
            filtered.as_binary::<i32>().clone(),
            self.crs.clone(),
        ))
    }

    /// Iterate over the decoded geometries of the active range.
    pub fn iter_geo(&self) -> impl Iterator<Item = Result<Option<Geometry>>> + '_ {
        let active = self.active_geometry();
        let chunks = active.into_inner();
        chunks.into_iter().flat_map(|chunk| {
            (0..chunk.len())
                .map(|i| {
                    if chunk.is_null(i) {
                        Ok(None)
                    } else {
                        from_wkb(chunk.value(i)).map(Some)
                    }
                })
                .collect::<Vec<_>>()
        })
    }

    /// Decode the active range into [`geo::Geometry`] objects.
    pub fn to_geo(&self) -> Result<Vec<Option<Geometry>>> {
        self.iter_geo().collect()
    }

    /// Decode the active range into WKT strings.
    pub fn to_wkt(&self) -> Result<Vec<Option<String>>> {
        self.iter_geo()
            .map(|maybe_geom| maybe_geom?.as_ref().map(to_wkt).transpose())
            .collect()
    }

    /// Apply `op` to every non-null geometry, producing a new series with the same CRS.
    pub(crate) fn try_map_geo<F>(&self, op: F) -> Result<Self>
    where
        F: Fn(Geometry) -> Result<Option<Geometry>> + Sync + Send,
    {
        let chunks = self.active_geometry().try_map(|chunk| {
            let mut output: Vec<Option<Vec<u8>>> = Vec::with_capacity(chunk.len());
            for i in 0..chunk.len() {
                if chunk.is_null(i) {
                    output.push(None);
                    continue;
                }
                let result = op(from_wkb(chunk.value(i))?)?;
                output.push(result.as_ref().map(to_wkb).transpose()?);
            }
            Ok(output.into_iter().collect::<BinaryArray>())
        })?;
        Ok(Self::new(ChunkedArray::new(chunks), self.crs.clone()))
    }

    /// Per-row convex hulls.
    pub fn convex_hull(&self) -> Result<Self> {
        self.try_map_geo(|geom| Ok(Some(Geometry::Polygon(geom.convex_hull()))))
    }

    /// Per-row distinct vertices, as multi points.
    pub fn vertices(&self) -> Result<Self> {
        self.try_map_geo(|geom| Ok(Some(Geometry::MultiPoint(unique_points(&geom)))))
    }

    /// Union of every geometry in the active range.
    ///
    /// With the `geos` feature this is GEOS `unary_union`, otherwise
    /// [`aggregate::union_all`](crate::algorithm::aggregate::union_all).
    pub fn union_all(&self) -> Result<Option<Geometry>> {
        let geoms: Vec<Geometry> = self.to_geo()?.into_iter().flatten().collect();
        #[cfg(feature = "geos")]
        return crate::algorithm::geos::unary_union(geoms);
        #[cfg(not(feature = "geos"))]
        Ok(union_all(geoms))
    }

    /// All distinct vertices of the active range as a single multi point.
    pub fn all_vertices(&self) -> Result<Option<Geometry>> {
        self.vertices()?.union_all()
    }

    /// Bounding rectangle of the whole active range.
    ///
    /// The range is split into chunks of `chunk_size` rows, the chunks are bounded independently
    /// (in parallel with the `rayon` feature) and the partial boxes are reduced again until a
    /// single chunk remains.
    pub fn total_bounds(&self, chunk_size: usize) -> Result<Option<Rect>> {
        let chunk_size = chunk_size.max(2);
        let chunks = self.rechunk(chunk_size)?;
        if chunks.num_chunks() <= 1 {
            let geoms = self.to_geo()?;
            return Ok(total_bounds(geoms.iter().flatten()));
        }

        debug!(chunks = chunks.num_chunks(), "computing total bounds per chunk");
        let partial = chunks.try_map(|chunk| {
            let geoms = decode_chunk(chunk)?;
            Ok(total_bounds(geoms.iter().flatten()).map(|rect| Geometry::Polygon(rect.to_polygon())))
        })?;
        Self::try_from_geometries(&partial, self.crs.clone())?.total_bounds(chunk_size)
    }

    /// Convex hull of the whole active range, reduced over chunks like
    /// [`GeoSeries::total_bounds`].
    pub fn convex_hull_all(&self, chunk_size: usize) -> Result<Option<Polygon>> {
        let chunk_size = chunk_size.max(2);
        let chunks = self.rechunk(chunk_size)?;
        if chunks.num_chunks() <= 1 {
            let geoms = self.to_geo()?;
            return Ok(convex_hull_all(geoms.iter().flatten()));
        }

        debug!(chunks = chunks.num_chunks(), "computing convex hull per chunk");
        let partial = chunks.try_map(|chunk| {
            let geoms = decode_chunk(chunk)?;
            Ok(convex_hull_all(geoms.iter().flatten()).map(Geometry::Polygon))
        })?;
        Self::try_from_geometries(&partial, self.crs.clone())?.convex_hull_all(chunk_size)
    }

    /// Reproject every geometry to `target` (for example `EPSG:3857`).
    #[cfg(feature = "proj")]
    pub fn to_crs(&self, target: &str) -> Result<Self> {
        let source = self.crs.as_deref().ok_or(GeoFrameError::CrsMismatch {
            left: None,
            right: Some(target.to_string()),
        })?;
        if source == target {
            return Ok(self.clone());
        }
        let mut output = crate::algorithm::proj::reproject(self, source, target)?;
        output.set_crs(Some(target.to_string()));
        Ok(output)
    }

    /// Bounding boxes of every active row, `None` for null or empty geometries.
    pub(crate) fn bounding_rects(&self) -> Result<Vec<Option<Rect>>> {
        self.iter_geo()
            .map(|maybe_geom| Ok(maybe_geom?.and_then(|geom| geom.bounding_rect())))
            .collect()
    }

    pub(crate) fn with_geometry(&self, geometry: ChunkedArray<BinaryArray>) -> Self {
        Self::new(geometry, self.crs.clone())
    }
}

pub(crate) fn decode_chunk(chunk: &BinaryArray) -> Result<Vec<Option<Geometry>>> {
    (0..chunk.len())
        .map(|i| {
            if chunk.is_null(i) {
                Ok(None)
            } else {
                from_wkb(chunk.value(i)).map(Some)
            }
        })
        .collect()
}

/// Distinct vertices of a geometry, in first-seen order.
pub(crate) fn unique_points(geom: &Geometry) -> MultiPoint {
    let mut seen: Vec<Point> = Vec::new();
    for coord in geom.coords_iter() {
        let point = Point::from(coord);
        if !seen.contains(&point) {
            seen.push(point);
        }
    }
    MultiPoint::new(seen)
}

impl From<BinaryArray> for GeoSeries {
    fn from(value: BinaryArray) -> Self {
        Self::from_wkb_array(value, None)
    }
}

impl TryFrom<Vec<Arc<dyn Array>>> for GeoSeries {
    type Error = GeoFrameError;

    fn try_from(value: Vec<Arc<dyn Array>>) -> Result<Self> {
        let chunks = value
            .iter()
            .map(|array| {
                array
                    .as_binary_opt::<i32>()
                    .cloned()
                    .ok_or(GeoFrameError::IncorrectType(
                        "Geometry column must be Binary".into(),
                    ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(ChunkedArray::try_new(chunks)?, None))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::series::{point_series, polygon_series};
    use geo::{coord, point, Area};

    #[test]
    fn active_range() {
        let mut series = point_series();
        assert_eq!(series.len(), 5);
        series.set_active_range(1, 3).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.length_original(), 5);
        assert_eq!(series.active_fraction(), 0.4);
        assert_eq!(
            series.value(0).unwrap(),
            Some(Geometry::Point(point!(x: 1., y: 1.)))
        );
        assert!(series.value(2).is_err());
        assert!(series.set_active_range(3, 1).is_err());
        assert!(series.set_active_range(0, 6).is_err());
    }

    #[test]
    fn trim_materializes_range() {
        let mut series = point_series();
        series.set_active_range(2, 5).unwrap();
        let trimmed = series.trim();
        assert_eq!(trimmed.length_original(), 3);
        assert_eq!(trimmed.get_active_range(), (0, 3));
        assert_eq!(trimmed.to_geo().unwrap(), series.to_geo().unwrap());
        assert_eq!(trimmed.crs(), Some("EPSG:4326"));
    }

    #[test]
    fn slice_python_semantics() {
        let series = point_series();
        assert_eq!(series.slice(1, Some(-1)).len(), 3);
        assert_eq!(series.slice(-10, None).len(), 5);
        assert_eq!(series.slice(3, Some(100)).len(), 2);
        assert_eq!(series.slice(4, Some(2)).len(), 0);
        assert_eq!(
            series.slice(-1, None).value(0).unwrap(),
            Some(Geometry::Point(point!(x: 4., y: 4.)))
        );
    }

    #[test]
    fn chunked_respects_active_range() {
        let mut series = point_series();
        series.set_active_range(1, 5).unwrap();
        // Rows 1..5 span the underlying chunks [0, 3) and [3, 5)
        let chunks = series.chunked(3);
        assert_eq!(
            chunks.iter().map(|chunk| chunk.len()).collect::<Vec<_>>(),
            vec![2, 2]
        );
        assert_eq!(
            chunks[1].value_data().as_ptr(),
            series.raw_geometry().chunks()[1].value_data().as_ptr()
        );
        assert_eq!(series.chunked(1).len(), 4);
        assert_eq!(series.chunked(10).len(), 2);
    }

    #[test]
    fn take_rows() {
        let series = point_series();
        let taken = series.take(&UInt32Array::from(vec![4, 0])).unwrap();
        assert_eq!(
            taken.to_geo().unwrap(),
            vec![
                Some(Geometry::Point(point!(x: 4., y: 4.))),
                Some(Geometry::Point(point!(x: 0., y: 0.))),
            ]
        );
        let empty = series.take(&UInt32Array::from(Vec::<u32>::new())).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn filter_rows() {
        let series = point_series();
        let mask = BooleanArray::from(vec![Some(true), None, Some(false), Some(true), Some(false)]);
        let filtered = series.filter(&mask).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(
            filtered.value(1).unwrap(),
            Some(Geometry::Point(point!(x: 3., y: 3.)))
        );
        assert!(series.filter(&BooleanArray::from(vec![true])).is_err());
    }

    #[test]
    fn bounds_over_many_chunks() {
        let series = point_series();
        let single = series.total_bounds(DEFAULT_BOUNDS_CHUNK_SIZE).unwrap().unwrap();
        let chunked = series.total_bounds(2).unwrap().unwrap();
        assert_eq!(single, chunked);
        assert_eq!(single.min(), coord! { x: 0., y: 0. });
        assert_eq!(single.max(), coord! { x: 4., y: 4. });
    }

    #[test]
    fn hull_over_many_chunks() {
        let series = polygon_series();
        let single = series.convex_hull_all(DEFAULT_HULL_CHUNK_SIZE).unwrap().unwrap();
        let chunked = series.convex_hull_all(1).unwrap().unwrap();
        assert_eq!(single.unsigned_area(), chunked.unsigned_area());
        assert_eq!(single.unsigned_area(), 12.0);
    }

    #[test]
    fn vertices_are_unique() {
        let series = polygon_series();
        let vertices = series.vertices().unwrap();
        // Closed rings repeat their first vertex
        match vertices.value(0).unwrap() {
            Some(Geometry::MultiPoint(mp)) => assert_eq!(mp.0.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
        match series.all_vertices().unwrap() {
            Some(Geometry::MultiPoint(mp)) => assert_eq!(mp.0.len(), 7),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn union_absorbs_interior_point() {
        let series =
            GeoSeries::try_from_wkt(&["POLYGON((0 0,2 0,2 2,0 2,0 0))", "POINT(1 1)"], None)
                .unwrap();
        let union = series.union_all().unwrap().unwrap();
        assert!(matches!(
            union,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_)
        ));
        assert_eq!(union.unsigned_area(), 4.0);
    }

    #[test]
    fn empty_series_bounds() {
        let series = GeoSeries::try_from_geometries(&[], None).unwrap();
        assert!(series.total_bounds(10).unwrap().is_none());
        assert_eq!(series.active_fraction(), 1.0);
    }
}
