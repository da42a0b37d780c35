//! Expressions over a geometry column that are evaluated only when their values are asked for.
//!
//! A [`Lazy`] pairs a [`GeoSeries`] with a named function of it. Indexing or slicing evaluates
//! the function on just the requested rows, so printing a long expression only decodes the
//! rows that are shown.

use std::fmt;
use std::sync::Arc;

use geo::{ConvexHull, CoordsIter, Geometry};

use crate::error::{GeoFrameError, Result};
use crate::geometry::{from_wkb, to_wkb, to_wkt};
use crate::io::display::{format_geometry, head_and_tail, TextTable, DEFAULT_MAX_WIDTH};
use crate::series::{unique_points, GeoSeries};

type LazyFn<T> = Arc<dyn Fn(&GeoSeries) -> Result<Vec<T>> + Send + Sync>;

/// A named function of a [`GeoSeries`], evaluated on demand.
pub struct Lazy<T> {
    name: String,
    series: GeoSeries,
    function: LazyFn<T>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            series: self.series.clone(),
            function: self.function.clone(),
        }
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl<T> Lazy<T> {
    /// Bind `function` to `series`. The function must return one value per row it is given.
    pub fn new<F>(name: impl Into<String>, series: &GeoSeries, function: F) -> Self
    where
        F: Fn(&GeoSeries) -> Result<Vec<T>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            series: series.clone(),
            function: Arc::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows of the bound series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate on row `i` only.
    pub fn get(&self, i: usize) -> Result<T> {
        if i >= self.len() {
            return Err(GeoFrameError::OutOfRange {
                index: i,
                len: self.len(),
            });
        }
        let row = self.series.slice(i as isize, Some(i as isize + 1));
        (self.function)(&row)?
            .into_iter()
            .next()
            .ok_or(GeoFrameError::LengthMismatch {
                expected: 1,
                actual: 0,
            })
    }

    /// Evaluate on rows `start..stop`, with the bounds of [`GeoSeries::slice`].
    pub fn slice(&self, start: isize, stop: Option<isize>) -> Result<Vec<T>> {
        (self.function)(&self.series.slice(start, stop))
    }

    /// Evaluate on every row.
    pub fn values(&self) -> Result<Vec<T>> {
        (self.function)(&self.series)
    }
}

fn per_row<T, F>(series: &GeoSeries, op: F) -> Result<Vec<Option<T>>>
where
    F: Fn(Geometry) -> Result<T>,
{
    series
        .iter_geo()
        .map(|maybe_geom| maybe_geom?.map(&op).transpose())
        .collect()
}

fn raw_wkb(series: &GeoSeries) -> Result<Vec<Option<Vec<u8>>>> {
    (0..series.len())
        .map(|i| Ok(series.wkb(i)?.map(|wkb| wkb.to_vec())))
        .collect()
}

impl Lazy<Option<String>> {
    /// WKT text of every geometry.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::lazy::Lazy;
    /// use geoframe::GeoSeries;
    ///
    /// let series = GeoSeries::try_from_wkt(&["POINT(1 2)", "POINT(3 4)"], None).unwrap();
    /// let wkt = Lazy::to_wkt(&series);
    /// assert_eq!(wkt.get(1).unwrap().as_deref(), Some("POINT(3 4)"));
    /// ```
    pub fn to_wkt(series: &GeoSeries) -> Self {
        Lazy::new("to_wkt", series, |series| per_row(series, |geom| to_wkt(&geom)))
    }
}

impl Lazy<Option<Geometry>> {
    /// Decoded geometries.
    pub fn from_wkb(series: &GeoSeries) -> Self {
        Lazy::new("from_wkb", series, |series| series.to_geo())
    }

    /// The distinct vertices of every geometry, as multi points.
    pub fn extract_unique_points(series: &GeoSeries) -> Self {
        Lazy::new("extract_unique_points", series, |series| {
            per_row(series, |geom| Ok(Geometry::MultiPoint(unique_points(&geom))))
        })
    }
}

impl Lazy<Option<Vec<u8>>> {
    /// The stored WKB bytes.
    pub fn to_wkb(series: &GeoSeries) -> Self {
        Lazy::new("to_wkb", series, raw_wkb)
    }

    /// WKB of the convex hull of every geometry.
    pub fn convex_hull(series: &GeoSeries) -> Self {
        Lazy::new("convex_hull", series, |series| {
            per_row(series, |geom| to_wkb(&Geometry::Polygon(geom.convex_hull())))
        })
    }
}

impl Lazy<Option<Vec<[f64; 2]>>> {
    /// `[x, y]` of every vertex of every geometry.
    pub fn get_coordinates(series: &GeoSeries) -> Self {
        Lazy::new("get_coordinates", series, |series| {
            per_row(series, |geom| {
                Ok(geom.coords_iter().map(|c| [c.x, c.y]).collect())
            })
        })
    }

    /// `[y, x]` of every vertex of every geometry.
    pub fn get_inverted_coordinates(series: &GeoSeries) -> Self {
        Lazy::new("get_inverted_coordinates", series, |series| {
            per_row(series, |geom| {
                Ok(geom.coords_iter().map(|c| [c.y, c.x]).collect())
            })
        })
    }
}

/// A value an expression can produce, with its plain-text rendering.
pub trait LazyValue {
    /// Type name shown in the expression header.
    const TYPE_NAME: &'static str;

    fn render(&self) -> String;
}

impl LazyValue for String {
    const TYPE_NAME: &'static str = "str";

    fn render(&self) -> String {
        self.clone()
    }
}

impl LazyValue for Geometry {
    const TYPE_NAME: &'static str = "geometry";

    fn render(&self) -> String {
        format_geometry(self, DEFAULT_MAX_WIDTH)
    }
}

impl LazyValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    /// WKB is shown as the geometry it encodes.
    fn render(&self) -> String {
        match from_wkb(self) {
            Ok(geom) => format_geometry(&geom, DEFAULT_MAX_WIDTH),
            Err(_) => format!("<{} bytes>", self.len()),
        }
    }
}

impl LazyValue for Vec<[f64; 2]> {
    const TYPE_NAME: &'static str = "coordinates";

    fn render(&self) -> String {
        let pairs: Vec<String> = self.iter().map(|[a, b]| format!("[{a}, {b}]")).collect();
        format!("[{}]", pairs.join(", "))
    }
}

impl<T: LazyValue> LazyValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn render(&self) -> String {
        match self {
            Some(value) => value.render(),
            None => "null".to_string(),
        }
    }
}

impl<T: LazyValue> fmt::Display for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Expression = {}", self.name)?;
        let head = format!("Length: {} type: {}", self.len(), T::TYPE_NAME);
        writeln!(f, "{head}")?;
        writeln!(f, "{}", "-".repeat(head.len()))?;

        let mut table = TextTable::new(None);
        for row in head_and_tail(self.len(), 5) {
            match row {
                Some(i) => {
                    let value = self.get(i).map_err(|_| fmt::Error)?;
                    table.push_row(vec![i.to_string(), value.render()]);
                }
                None => table.push_ellipsis(),
            }
        }
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::series::{line_series, point_series, polygon_series};
    use geo::Area;

    #[test]
    fn evaluates_single_rows() {
        let series = point_series();
        let wkt = Lazy::to_wkt(&series);
        assert_eq!(wkt.len(), 5);
        assert_eq!(wkt.get(3).unwrap().as_deref(), Some("POINT(3 3)"));
        assert!(wkt.get(5).is_err());
        assert_eq!(wkt.slice(-2, None).unwrap().len(), 2);
        assert_eq!(wkt.values().unwrap().len(), 5);
    }

    #[test]
    fn follows_active_range() {
        let mut series = point_series();
        series.set_active_range(2, 4).unwrap();
        let coords = Lazy::get_coordinates(&series);
        assert_eq!(coords.len(), 2);
        assert_eq!(coords.get(0).unwrap(), Some(vec![[2., 2.]]));
    }

    #[test]
    fn inverted_coordinates() {
        let series = line_series();
        let coords = Lazy::get_coordinates(&series).get(0).unwrap().unwrap();
        let inverted = Lazy::get_inverted_coordinates(&series).get(0).unwrap().unwrap();
        assert_eq!(coords.len(), inverted.len());
        for (c, i) in coords.iter().zip(inverted.iter()) {
            assert_eq!([c[1], c[0]], *i);
        }
    }

    #[test]
    fn geometry_expressions() {
        let series = polygon_series();
        let hulls = Lazy::convex_hull(&series).values().unwrap();
        let hull = from_wkb(hulls[0].as_ref().unwrap()).unwrap();
        assert_eq!(hull.unsigned_area(), 4.0);
        assert!(hulls[2].is_none());

        let points = Lazy::extract_unique_points(&series).get(0).unwrap();
        assert!(matches!(points, Some(Geometry::MultiPoint(mp)) if mp.0.len() == 4));

        let wkb = Lazy::to_wkb(&series).get(1).unwrap().unwrap();
        assert_eq!(Lazy::from_wkb(&series).get(1).unwrap(), Some(from_wkb(&wkb).unwrap()));
    }

    #[test]
    fn display_header() {
        let series = point_series();
        let text = Lazy::to_wkb(&series).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Expression = to_wkb");
        assert_eq!(lines[1], "Length: 5 type: bytes");
        assert_eq!(lines[2], "-".repeat(lines[1].len()));
        assert_eq!(lines[3], "0  <POINT(0 0)>");
        assert_eq!(lines.len(), 8);
    }
}
