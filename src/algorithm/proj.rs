//! Reprojection of geometry columns using PROJ.

use arrow_array::BinaryArray;
use geo::Geometry;
use proj::{Proj, Transform};
use tracing::debug;

use crate::chunked_array::ChunkedArray;
use crate::error::Result;
use crate::series::GeoSeries;

/// Reproject every geometry of the active range from `source` to `target`, both given as
/// `AUTHORITY:CODE` strings. The returned series keeps the CRS label of `series`.
///
/// Coordinates are always treated as x/y (longitude/latitude) regardless of the axis order
/// the authority defines.
pub fn reproject(series: &GeoSeries, source: &str, target: &str) -> Result<GeoSeries> {
    debug!(source, target, rows = series.len(), "reprojecting geometry");
    let chunks = series.active_geometry().try_map(|chunk| {
        // A PROJ context cannot be shared between threads
        let proj = Proj::new_known_crs(source, target, None)?;
        let mut output: Vec<Option<Vec<u8>>> = Vec::with_capacity(chunk.len());
        for maybe_geom in crate::series::decode_chunk(chunk)? {
            match maybe_geom {
                Some(mut geom) => {
                    transform(&mut geom, &proj)?;
                    output.push(Some(crate::geometry::to_wkb(&geom)?));
                }
                None => output.push(None),
            }
        }
        Ok(output.into_iter().collect::<BinaryArray>())
    })?;
    Ok(series.with_geometry(ChunkedArray::try_new(chunks)?))
}

fn transform(geom: &mut Geometry, proj: &Proj) -> Result<()> {
    geom.transform(proj)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use geo::point;

    #[test]
    fn point_to_web_mercator() {
        let series = GeoSeries::try_from_geometries(
            &[Some(point!(x: 0., y: 1.).into()), None],
            Some("EPSG:4326".to_string()),
        )
        .unwrap();

        // echo 1 0 | cs2cs EPSG:4326 EPSG:3857
        // 0.00	111325.14 0.00
        let out = series.to_crs("EPSG:3857").unwrap();
        assert_eq!(out.crs(), Some("EPSG:3857"));
        match out.value(0).unwrap() {
            Some(Geometry::Point(p)) => {
                assert_eq!(p.x(), 0.0);
                assert_relative_eq!(p.y(), 111325.1428663851);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(out.value(1).unwrap().is_none());
    }

    #[test]
    fn same_crs_is_noop() {
        let series = GeoSeries::try_from_wkt(&["POINT(1 2)"], Some("EPSG:4326".to_string())).unwrap();
        assert_eq!(series.to_crs("EPSG:4326").unwrap(), series);
        let unlabelled = GeoSeries::try_from_wkt(&["POINT(1 2)"], None).unwrap();
        assert!(unlabelled.to_crs("EPSG:3857").is_err());
    }
}
