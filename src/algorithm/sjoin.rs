//! Spatial join of two frames.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions, UInt32Array};
use arrow_schema::{Field, Schema};
use geo::{BoundingRect, EuclideanDistance, Geometry, Relate};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeoFrameError, Result};
use crate::frame::{GeoDataFrame, GEOMETRY_COLUMN};

/// Which rows of the two frames survive a join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    /// Every left row, with the attributes of its matches or nulls.
    #[default]
    Left,
    /// Every right row, with the attributes of its matches or nulls.
    Right,
    /// Only pairs of matching rows.
    Inner,
}

/// The spatial relation a pair of rows must satisfy, read as `left <predicate> right`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialPredicate {
    Contains,
    #[default]
    Within,
    Intersects,
    /// Geometries at most this far apart.
    DWithin(f64),
}

impl SpatialPredicate {
    /// The predicate with its operands swapped.
    fn converse(self) -> Self {
        match self {
            SpatialPredicate::Contains => SpatialPredicate::Within,
            SpatialPredicate::Within => SpatialPredicate::Contains,
            other => other,
        }
    }

    fn evaluate(&self, left: &Geometry, right: &Geometry) -> bool {
        match self {
            SpatialPredicate::Contains => left.relate(right).is_contains(),
            SpatialPredicate::Within => left.relate(right).is_within(),
            SpatialPredicate::Intersects => left.relate(right).is_intersects(),
            SpatialPredicate::DWithin(distance) => left.euclidean_distance(right) <= *distance,
        }
    }

    fn search_margin(&self) -> f64 {
        match self {
            SpatialPredicate::DWithin(distance) => *distance,
            _ => 0.,
        }
    }
}

/// Parameters of [`sjoin`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialJoinOptions {
    pub how: JoinHow,
    pub predicate: SpatialPredicate,
    /// Added in front of left column names that collide with a right column name.
    pub lprefix: String,
    pub rprefix: String,
    /// Added after left column names that collide with a right column name.
    pub lsuffix: String,
    pub rsuffix: String,
    /// When false, a kept row matching more than one row of the other frame is an error.
    pub allow_duplication: bool,
}

impl Default for SpatialJoinOptions {
    fn default() -> Self {
        Self {
            how: JoinHow::Left,
            predicate: SpatialPredicate::Within,
            lprefix: String::new(),
            rprefix: String::new(),
            lsuffix: String::new(),
            rsuffix: String::new(),
            allow_duplication: true,
        }
    }
}

/// A decoded geometry stored in the join index.
struct IndexedGeometry {
    index: usize,
    geometry: Geometry,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedGeometry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(geom: &Geometry, margin: f64) -> Option<AABB<[f64; 2]>> {
    geom.bounding_rect().map(|rect| {
        AABB::from_corners(
            [rect.min().x - margin, rect.min().y - margin],
            [rect.max().x + margin, rect.max().y + margin],
        )
    })
}

/// Join the attributes of `right` onto `left` where their geometries satisfy a spatial
/// predicate.
///
/// The R-tree is built on the shorter frame. Colliding attribute names are renamed with the
/// prefixes and suffixes of `options`; a collision that survives renaming is an error. The
/// result holds the left geometry for [`JoinHow::Left`] and [`JoinHow::Inner`] and the right
/// geometry for [`JoinHow::Right`], ordered by the kept frame's rows and then by the other
/// frame's rows.
///
/// # Examples
///
/// ```
/// use geoframe::algorithm::sjoin::{sjoin, JoinHow, SpatialJoinOptions, SpatialPredicate};
/// use geoframe::{GeoDataFrame, GeoSeries};
///
/// let points = GeoSeries::try_from_wkt(&["POINT(1 1)", "POINT(5 5)"], None).unwrap();
/// let zones = GeoSeries::try_from_wkt(&["POLYGON((0 0,2 0,2 2,0 2,0 0))"], None).unwrap();
/// let options = SpatialJoinOptions {
///     how: JoinHow::Inner,
///     predicate: SpatialPredicate::Within,
///     ..Default::default()
/// };
/// let joined = sjoin(
///     &GeoDataFrame::from_geometry(points),
///     &GeoDataFrame::from_geometry(zones),
///     &options,
/// )
/// .unwrap();
/// assert_eq!(joined.len(), 1);
/// ```
pub fn sjoin(
    left: &GeoDataFrame,
    right: &GeoDataFrame,
    options: &SpatialJoinOptions,
) -> Result<GeoDataFrame> {
    if let SpatialPredicate::DWithin(distance) = options.predicate {
        if !(distance >= 0.) {
            return Err(GeoFrameError::General(format!(
                "dwithin distance must be a non-negative number, got {distance}"
            )));
        }
    }

    let left = left.trim()?;
    let right = align_crs(&left, right.trim()?)?;

    let left_geoms = left.geometry().to_geo()?;
    let right_geoms = right.geometry().to_geo()?;

    let swapped = left.len() < right.len();
    let pairs = if swapped {
        debug!(rows = left.len(), "indexing left frame");
        let mut pairs = query_pairs(&left_geoms, &right_geoms, options.predicate.converse());
        for pair in pairs.iter_mut() {
            *pair = (pair.1, pair.0);
        }
        pairs
    } else {
        debug!(rows = right.len(), "indexing right frame");
        query_pairs(&right_geoms, &left_geoms, options.predicate)
    };
    debug!(matches = pairs.len(), "spatial join candidates evaluated");

    let (left_indices, right_indices) = join_indices(
        pairs,
        left.len(),
        right.len(),
        options.how,
        options.allow_duplication,
    )?;

    let geometry = match options.how {
        JoinHow::Left | JoinHow::Inner => left.geometry().take(&left_indices)?,
        JoinHow::Right => right.geometry().take(&right_indices)?,
    };

    let (left_names, right_names) = resolve_names(&left, &right, options)?;
    let left_batch = left.attributes()?;
    let right_batch = right.attributes()?;

    let mut fields: Vec<Field> = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    for (batch, indices, names) in [
        (&left_batch, &left_indices, &left_names),
        (&right_batch, &right_indices, &right_names),
    ] {
        for ((field, column), name) in batch
            .schema()
            .fields()
            .iter()
            .zip(batch.columns())
            .zip(names)
        {
            let taken = arrow::compute::take(column.as_ref(), indices, None)?;
            fields.push(
                field
                    .as_ref()
                    .clone()
                    .with_name(name)
                    .with_nullable(field.is_nullable() || taken.null_count() > 0),
            );
            columns.push(taken);
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(geometry.len()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), columns, &options)?;
    GeoDataFrame::try_new(schema, vec![batch], geometry)
}

/// Reproject `right` into the CRS of `left` when both are labelled and differ.
fn align_crs(left: &GeoDataFrame, right: GeoDataFrame) -> Result<GeoDataFrame> {
    match (left.crs(), right.crs()) {
        (Some(l), Some(r)) if l != r => {
            #[cfg(feature = "proj")]
            {
                debug!(from = r, to = l, "reprojecting right frame");
                right.to_crs(l)
            }
            #[cfg(not(feature = "proj"))]
            {
                Err(GeoFrameError::CrsMismatch {
                    left: Some(l.to_string()),
                    right: Some(r.to_string()),
                })
            }
        }
        _ => Ok(right),
    }
}

/// Index `tree_side` and query it with every geometry of `query_side`, returning
/// `(query_row, tree_row)` pairs for which `query <predicate> tree` holds.
fn query_pairs(
    tree_side: &[Option<Geometry>],
    query_side: &[Option<Geometry>],
    predicate: SpatialPredicate,
) -> Vec<(usize, usize)> {
    let indexed: Vec<IndexedGeometry> = tree_side
        .iter()
        .enumerate()
        .filter_map(|(index, maybe_geom)| {
            let geometry = maybe_geom.as_ref()?;
            Some(IndexedGeometry {
                index,
                envelope: envelope_of(geometry, 0.)?,
                geometry: geometry.clone(),
            })
        })
        .collect();
    let tree = RTree::bulk_load(indexed);

    let mut pairs = Vec::new();
    for (query_index, maybe_geom) in query_side.iter().enumerate() {
        let Some(query) = maybe_geom else {
            continue;
        };
        let Some(envelope) = envelope_of(query, predicate.search_margin()) else {
            continue;
        };
        let mut matches: Vec<usize> = tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|candidate| predicate.evaluate(query, &candidate.geometry))
            .map(|candidate| candidate.index)
            .collect();
        matches.sort_unstable();
        pairs.extend(matches.into_iter().map(|tree_index| (query_index, tree_index)));
    }
    pairs
}

/// Row indices into the left and right frames for every output row.
fn join_indices(
    mut pairs: Vec<(usize, usize)>,
    left_len: usize,
    right_len: usize,
    how: JoinHow,
    allow_duplication: bool,
) -> Result<(UInt32Array, UInt32Array)> {
    // Orient pairs as (kept, other)
    if how == JoinHow::Right {
        for pair in pairs.iter_mut() {
            *pair = (pair.1, pair.0);
        }
    }
    pairs.sort_unstable();

    if !allow_duplication {
        if let Some(window) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(GeoFrameError::Duplication(window[0].0));
        }
    }

    let mut kept: Vec<Option<u32>> = Vec::with_capacity(pairs.len());
    let mut other: Vec<Option<u32>> = Vec::with_capacity(pairs.len());
    match how {
        JoinHow::Inner => {
            for (k, o) in pairs {
                kept.push(Some(k as u32));
                other.push(Some(o as u32));
            }
        }
        JoinHow::Left | JoinHow::Right => {
            let kept_len = if how == JoinHow::Left { left_len } else { right_len };
            let mut pairs = pairs.into_iter().peekable();
            for row in 0..kept_len {
                let mut matched = false;
                while let Some((_, o)) = pairs.next_if(|(k, _)| *k == row) {
                    kept.push(Some(row as u32));
                    other.push(Some(o as u32));
                    matched = true;
                }
                if !matched {
                    kept.push(Some(row as u32));
                    other.push(None);
                }
            }
        }
    }

    let kept = UInt32Array::from(kept);
    let other = UInt32Array::from(other);
    Ok(match how {
        JoinHow::Right => (other, kept),
        _ => (kept, other),
    })
}

/// Output names of the left and right attribute columns.
fn resolve_names(
    left: &GeoDataFrame,
    right: &GeoDataFrame,
    options: &SpatialJoinOptions,
) -> Result<(Vec<String>, Vec<String>)> {
    let left_names = left.column_names();
    let right_names = right.column_names();

    let rename = |names: &[String], others: &[String], prefix: &str, suffix: &str| {
        names
            .iter()
            .map(|name| {
                if others.contains(name) {
                    format!("{prefix}{name}{suffix}")
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
    };
    let left_out = rename(&left_names, &right_names, &options.lprefix, &options.lsuffix);
    let right_out = rename(&right_names, &left_names, &options.rprefix, &options.rsuffix);

    let mut seen: Vec<&String> = Vec::with_capacity(left_out.len() + right_out.len());
    for name in left_out.iter().chain(right_out.iter()) {
        if name == GEOMETRY_COLUMN || seen.contains(&name) {
            return Err(GeoFrameError::DuplicateColumn(name.clone()));
        }
        seen.push(name);
    }
    Ok((left_out, right_out))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::frame::{point_frame, zone_frame};
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;

    fn ids(frame: &GeoDataFrame, name: &str) -> Vec<Option<i64>> {
        frame
            .column(name)
            .unwrap()
            .as_primitive::<Int64Type>()
            .iter()
            .collect()
    }

    fn options(how: JoinHow, predicate: SpatialPredicate) -> SpatialJoinOptions {
        SpatialJoinOptions {
            how,
            predicate,
            rsuffix: "_right".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn points_within_zones_left() {
        // 5 points on the diagonal, 2 zones: zone 0 covers (0..2.5), zone 1 covers (2.5..5)
        let joined = sjoin(
            &point_frame(),
            &zone_frame(),
            &options(JoinHow::Left, SpatialPredicate::Within),
        )
        .unwrap();
        assert_eq!(joined.len(), 5);
        assert_eq!(
            joined.column_names(),
            vec!["id", "name", "id_right", "zone"]
        );
        assert_eq!(
            ids(&joined, "id_right"),
            vec![None, Some(0), Some(0), Some(1), Some(1)]
        );
        assert_eq!(joined.crs(), Some("EPSG:4326"));
    }

    #[test]
    fn zones_contain_points_swapped() {
        // The zone frame is shorter, so the index is built on it and the predicate flipped
        let joined = sjoin(
            &zone_frame(),
            &point_frame(),
            &SpatialJoinOptions {
                how: JoinHow::Inner,
                predicate: SpatialPredicate::Contains,
                lsuffix: "_zone".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(joined.len(), 4);
        assert_eq!(
            ids(&joined, "id_zone"),
            vec![Some(0), Some(0), Some(1), Some(1)]
        );
        assert_eq!(ids(&joined, "id"), vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn right_join_keeps_right_rows() {
        let joined = sjoin(
            &zone_frame(),
            &point_frame(),
            &SpatialJoinOptions {
                how: JoinHow::Right,
                predicate: SpatialPredicate::Contains,
                lprefix: "zone_".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(joined.len(), 5);
        assert_eq!(ids(&joined, "id"), vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(
            ids(&joined, "zone_id"),
            vec![None, Some(0), Some(0), Some(1), Some(1)]
        );
        // Geometry comes from the kept right side
        assert_eq!(
            joined.geometry().value(0).unwrap(),
            point_frame().geometry().value(0).unwrap()
        );
    }

    #[test]
    fn dwithin_uses_distance() {
        let joined = sjoin(
            &point_frame(),
            &zone_frame(),
            &options(JoinHow::Inner, SpatialPredicate::DWithin(0.6)),
        )
        .unwrap();
        // Point 0 is ~0.71 away from zone 0, point 2 is inside zone 0 and 0.5 from zone 1
        assert_eq!(
            ids(&joined, "id"),
            vec![Some(1), Some(2), Some(2), Some(3), Some(4)]
        );
        assert!(sjoin(
            &point_frame(),
            &zone_frame(),
            &options(JoinHow::Inner, SpatialPredicate::DWithin(-1.)),
        )
        .is_err());
    }

    #[test]
    fn duplication_and_collisions() {
        let strict = SpatialJoinOptions {
            allow_duplication: false,
            ..options(JoinHow::Left, SpatialPredicate::DWithin(0.6))
        };
        assert!(matches!(
            sjoin(&point_frame(), &zone_frame(), &strict),
            Err(GeoFrameError::Duplication(2))
        ));

        let collide = SpatialJoinOptions::default();
        assert!(matches!(
            sjoin(&point_frame(), &zone_frame(), &collide),
            Err(GeoFrameError::DuplicateColumn(_))
        ));
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn crs_mismatch_without_proj() {
        let mut zones = zone_frame();
        let geometry = {
            let mut series = zones.geometry().clone();
            series.set_crs(Some("EPSG:3857".to_string()));
            series
        };
        zones.set_geometry(geometry).unwrap();
        assert!(matches!(
            sjoin(&point_frame(), &zones, &options(JoinHow::Left, SpatialPredicate::Within)),
            Err(GeoFrameError::CrsMismatch { .. })
        ));
    }

    #[cfg(feature = "proj")]
    #[test]
    fn reprojects_right_frame() {
        let zones = zone_frame().to_crs("EPSG:3857").unwrap();
        assert_eq!(zones.crs(), Some("EPSG:3857"));
        assert!(zones.geometry().total_bounds(10).unwrap().unwrap().max().x > 1000.);

        let joined = sjoin(
            &point_frame(),
            &zones,
            &options(JoinHow::Inner, SpatialPredicate::Within),
        )
        .unwrap();
        assert_eq!(joined.crs(), Some("EPSG:4326"));
        assert_eq!(ids(&joined, "id"), vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(
            ids(&joined, "id_right"),
            vec![Some(0), Some(0), Some(1), Some(1)]
        );
    }

    #[test]
    fn join_index_layout() {
        let pairs = vec![(2, 0), (0, 1), (0, 0)];
        let (left, right) = join_indices(pairs.clone(), 3, 2, JoinHow::Left, true).unwrap();
        assert_eq!(
            left.iter().collect::<Vec<_>>(),
            vec![Some(0), Some(0), Some(1), Some(2)]
        );
        assert_eq!(
            right.iter().collect::<Vec<_>>(),
            vec![Some(0), Some(1), None, Some(0)]
        );
        let (left, right) = join_indices(pairs, 3, 2, JoinHow::Right, true).unwrap();
        assert_eq!(
            right.iter().collect::<Vec<_>>(),
            vec![Some(0), Some(0), Some(1)]
        );
        assert_eq!(
            left.iter().collect::<Vec<_>>(),
            vec![Some(0), Some(2), Some(0)]
        );
    }
}
