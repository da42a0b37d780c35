//! Boolean tests of every geometry in a series, alone or against one other geometry.

use arrow::compute::kernels::boolean;
use arrow_array::{Array, BooleanArray};
use geo::dimensions::Dimensions;
use geo::relate::IntersectionMatrix;
use geo::{CoordsIter, EuclideanDistance, Geometry, HasDimensions, Relate, Winding};

use crate::algorithm::DEFAULT_PREDICATE_CHUNK_SIZE;
use crate::chunked_array::ChunkedArray;
use crate::error::{GeoFrameError, Result};
use crate::geometry::{GeometryInput, GeometryType};
use crate::series::{decode_chunk, GeoSeries};

/// The named result of a predicate, usable as a row filter.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateFilter {
    name: String,
    filter: BooleanArray,
}

impl PredicateFilter {
    pub fn new(name: impl Into<String>, filter: BooleanArray) -> Self {
        Self {
            name: name.into(),
            filter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &BooleanArray {
        &self.filter
    }

    pub fn into_inner(self) -> BooleanArray {
        self.filter
    }

    pub fn len(&self) -> usize {
        self.filter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    /// Number of rows that passed.
    pub fn true_count(&self) -> usize {
        self.filter.true_count()
    }

    /// Rows passing both filters.
    pub fn and(&self, other: &PredicateFilter) -> Result<Self> {
        Ok(Self::new(
            format!("{}_and_{}", self.name, other.name),
            boolean::and(&self.filter, &other.filter)?,
        ))
    }

    /// Rows passing either filter.
    pub fn or(&self, other: &PredicateFilter) -> Result<Self> {
        Ok(Self::new(
            format!("{}_or_{}", self.name, other.name),
            boolean::or(&self.filter, &other.filter)?,
        ))
    }

    /// Rows failing this filter.
    pub fn not(&self) -> Result<Self> {
        Ok(Self::new(
            format!("not_{}", self.name),
            boolean::not(&self.filter)?,
        ))
    }
}

impl From<PredicateFilter> for BooleanArray {
    fn from(value: PredicateFilter) -> Self {
        value.filter
    }
}

/// Predicates over the active range of a [`GeoSeries`].
///
/// Rows are evaluated in chunks of `chunk_size` (in parallel with the `rayon` feature) and the
/// results concatenated in row order. Null geometries evaluate to `false`, except for
/// [`Predicates::is_missing`].
#[derive(Debug, Clone, Copy)]
pub struct Predicates<'a> {
    series: &'a GeoSeries,
    chunk_size: usize,
}

impl<'a> Predicates<'a> {
    pub fn new(series: &'a GeoSeries) -> Self {
        Self {
            series,
            chunk_size: DEFAULT_PREDICATE_CHUNK_SIZE,
        }
    }

    /// Change the number of rows evaluated per chunk.
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ..self
        }
    }

    fn unary<F>(&self, name: &str, op: F) -> Result<PredicateFilter>
    where
        F: Fn(Option<&Geometry>) -> Result<bool> + Sync + Send,
    {
        let chunks = self.series.rechunk(self.chunk_size)?.try_map(|chunk| {
            let geoms = decode_chunk(chunk)?;
            let values = geoms
                .iter()
                .map(|maybe_geom| op(maybe_geom.as_ref()))
                .collect::<Result<Vec<bool>>>()?;
            Ok(BooleanArray::from(values))
        })?;
        let filter =
            ChunkedArray::try_new(chunks)?.concat_or(BooleanArray::from(Vec::<bool>::new()))?;
        Ok(PredicateFilter::new(name, filter))
    }

    fn binary<F>(&self, name: &str, other: GeometryInput, op: F) -> Result<PredicateFilter>
    where
        F: Fn(&Geometry, &Geometry) -> Result<bool> + Sync + Send,
    {
        let other = other.to_geo()?;
        self.unary(name, |maybe_geom| match maybe_geom {
            Some(geom) => op(geom, &other),
            None => Ok(false),
        })
    }

    fn relate_with<F>(&self, name: &str, other: GeometryInput, op: F) -> Result<PredicateFilter>
    where
        F: Fn(&IntersectionMatrix, &Geometry, &Geometry) -> bool + Sync + Send,
    {
        self.binary(name, other, |geom, other| {
            Ok(op(&geom.relate(other), geom, other))
        })
    }

    /// Rows whose geometry contains `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::algorithm::Predicates;
    /// use geoframe::GeoSeries;
    ///
    /// let series = GeoSeries::try_from_wkt(
    ///     &["POLYGON((0 0,2 0,2 2,0 2,0 0))", "POINT(5 5)"],
    ///     None,
    /// )
    /// .unwrap();
    /// let result = Predicates::new(&series).contains("POINT(1 1)").unwrap();
    /// assert_eq!(result.name(), "contains");
    /// assert!(result.filter().value(0));
    /// assert!(!result.filter().value(1));
    /// ```
    pub fn contains(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("contains", other.into(), |m, _, _| m.is_contains())
    }

    /// Rows that contain `other` with no boundary contact.
    pub fn contains_properly(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("contains_properly", other.into(), |m, _, _| {
            matches_any(m, &["T**FF*FF*"])
        })
    }

    pub fn covered_by(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("covered_by", other.into(), |m, _, _| {
            matches_any(m, &["T*F**F***", "*TF**F***", "**FT*F***", "**F*TF***"])
        })
    }

    pub fn covers(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("covers", other.into(), |m, _, _| {
            matches_any(m, &["T*****FF*", "*T****FF*", "***T**FF*", "****T*FF*"])
        })
    }

    pub fn crosses(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("crosses", other.into(), |m, geom, other| {
            match (dimension(geom), dimension(other)) {
                (Some(1), Some(1)) => matches_any(m, &["0********"]),
                (Some(a), Some(b)) if a < b => matches_any(m, &["T*T******"]),
                (Some(a), Some(b)) if a > b => matches_any(m, &["T*****T**"]),
                _ => false,
            }
        })
    }

    pub fn disjoint(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("disjoint", other.into(), |m, _, _| m.is_disjoint())
    }

    /// Rows topologically equal to `other`.
    pub fn equals(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("equals", other.into(), |m, _, _| {
            matches_any(m, &["T*F**FFF*"])
        })
    }

    /// Rows structurally equal to `other`: same type, same vertices in the same order, each
    /// vertex within `tolerance` of its counterpart.
    pub fn equals_exact(
        &self,
        other: impl Into<GeometryInput>,
        tolerance: f64,
    ) -> Result<PredicateFilter> {
        self.binary("equals_exact", other.into(), |geom, other| {
            if GeometryType::of(geom) != GeometryType::of(other)
                || geom.coords_count() != other.coords_count()
            {
                return Ok(false);
            }
            Ok(geom
                .coords_iter()
                .zip(other.coords_iter())
                .all(|(a, b)| {
                    geo::Point::from(a).euclidean_distance(&geo::Point::from(b)) <= tolerance
                }))
        })
    }

    pub fn intersects(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("intersects", other.into(), |m, _, _| m.is_intersects())
    }

    pub fn overlaps(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("overlaps", other.into(), |m, geom, other| {
            match (dimension(geom), dimension(other)) {
                (Some(1), Some(1)) => matches_any(m, &["1*T***T**"]),
                (Some(a), Some(b)) if a == b => matches_any(m, &["T*T***T**"]),
                _ => false,
            }
        })
    }

    /// Rows whose DE-9IM matrix against `other` matches `pattern`, e.g. `"T*F**FFF*"`.
    ///
    /// Returns an error when `pattern` is not nine characters of `T`, `F`, `*`, `0`, `1`, `2`.
    pub fn relate_pattern(
        &self,
        other: impl Into<GeometryInput>,
        pattern: &str,
    ) -> Result<PredicateFilter> {
        validate_pattern(pattern)?;
        self.relate_with("relate_pattern", other.into(), |m, _, _| {
            matches_any(m, &[pattern])
        })
    }

    pub fn touches(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("touches", other.into(), |m, _, _| {
            matches_any(m, &["FT*******", "F**T*****", "F***T****"])
        })
    }

    pub fn within(&self, other: impl Into<GeometryInput>) -> Result<PredicateFilter> {
        self.relate_with("within", other.into(), |m, _, _| m.is_within())
    }

    /// Rows holding counter-clockwise line strings. Only line strings can be
    /// counter-clockwise; an open one is judged as if its last vertex joined the first, and
    /// fewer than three distinct vertices give `false`.
    pub fn is_ccw(&self) -> Result<PredicateFilter> {
        self.unary("is_ccw", |maybe_geom| {
            Ok(match maybe_geom {
                Some(Geometry::LineString(ls)) if ls.is_closed() => ls.is_ccw(),
                Some(Geometry::LineString(ls)) => {
                    let mut ring = ls.clone();
                    ring.close();
                    ring.is_ccw()
                }
                _ => false,
            })
        })
    }

    /// Rows holding line strings whose first and last vertex coincide.
    pub fn is_closed(&self) -> Result<PredicateFilter> {
        self.unary("is_closed", |maybe_geom| {
            Ok(match maybe_geom {
                Some(Geometry::LineString(ls)) => !ls.0.is_empty() && ls.is_closed(),
                Some(Geometry::MultiLineString(mls)) => !mls.0.is_empty() && mls.is_closed(),
                _ => false,
            })
        })
    }

    pub fn is_empty(&self) -> Result<PredicateFilter> {
        self.unary("is_empty", |maybe_geom| {
            Ok(maybe_geom.map(|geom| geom.is_empty()).unwrap_or(false))
        })
    }

    /// Rows with a null geometry.
    pub fn is_missing(&self) -> Result<PredicateFilter> {
        self.unary("is_missing", |maybe_geom| Ok(maybe_geom.is_none()))
    }

    /// Rows whose geometry type is one of `types`.
    pub fn has_type(&self, types: &[GeometryType]) -> Result<PredicateFilter> {
        self.unary("geometric_type", |maybe_geom| {
            Ok(maybe_geom
                .map(|geom| types.contains(&GeometryType::of(geom)))
                .unwrap_or(false))
        })
    }

    #[cfg(feature = "geos")]
    pub fn is_ring(&self) -> Result<PredicateFilter> {
        self.unary("is_ring", |maybe_geom| match maybe_geom {
            Some(geom @ Geometry::LineString(_)) => crate::algorithm::geos::is_ring(geom),
            _ => Ok(false),
        })
    }

    #[cfg(feature = "geos")]
    pub fn is_simple(&self) -> Result<PredicateFilter> {
        self.unary("is_simple", |maybe_geom| match maybe_geom {
            Some(geom) => crate::algorithm::geos::is_simple(geom),
            None => Ok(false),
        })
    }

    #[cfg(feature = "geos")]
    pub fn is_valid(&self) -> Result<PredicateFilter> {
        self.unary("is_valid", |maybe_geom| match maybe_geom {
            Some(geom) => crate::algorithm::geos::is_valid(geom),
            None => Ok(false),
        })
    }
}

fn dimension(geom: &Geometry) -> Option<u8> {
    match geom.dimensions() {
        Dimensions::Empty => None,
        Dimensions::ZeroDimensional => Some(0),
        Dimensions::OneDimensional => Some(1),
        Dimensions::TwoDimensional => Some(2),
    }
}

fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.chars().count() != 9
        || !pattern
            .chars()
            .all(|c| matches!(c, 'T' | 'F' | '*' | '0' | '1' | '2'))
    {
        return Err(GeoFrameError::General(format!(
            "Invalid DE-9IM pattern {pattern:?}"
        )));
    }
    Ok(())
}

fn matches_any(matrix: &IntersectionMatrix, patterns: &[&str]) -> bool {
    patterns
        .iter()
        .any(|pattern| matrix.matches(pattern).unwrap_or(false))
}
