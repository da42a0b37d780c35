use arrow_array::BinaryArray;
use geo::{line_string, point, polygon, Geometry};

use crate::chunked_array::ChunkedArray;
use crate::geometry::to_wkb;
use crate::series::GeoSeries;

fn wkb_chunk(geoms: &[Option<Geometry>]) -> BinaryArray {
    let wkb: Vec<Option<Vec<u8>>> = geoms
        .iter()
        .map(|maybe_geom| maybe_geom.as_ref().map(|geom| to_wkb(geom).unwrap()))
        .collect();
    BinaryArray::from_iter(wkb)
}

/// `POINT(i i)` for `i` in `0..5`, stored in two chunks.
pub(crate) fn point_series() -> GeoSeries {
    let points: Vec<Option<Geometry>> = (0..5)
        .map(|i| Some(point!(x: i as f64, y: i as f64).into()))
        .collect();
    let chunks = vec![wkb_chunk(&points[..3]), wkb_chunk(&points[3..])];
    GeoSeries::new(ChunkedArray::new(chunks), Some("EPSG:4326".to_string()))
}

/// Two adjacent 2x2 squares touching at `(2, 2)`, then a null.
pub(crate) fn polygon_series() -> GeoSeries {
    let geoms = vec![
        Some(polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 2.), (x: 0., y: 2.)].into()),
        Some(polygon![(x: 2., y: 2.), (x: 4., y: 2.), (x: 4., y: 4.), (x: 2., y: 4.)].into()),
        None,
    ];
    GeoSeries::try_from_geometries(&geoms, Some("EPSG:4326".to_string())).unwrap()
}

/// An open diagonal and a closed counter-clockwise unit square ring.
pub(crate) fn line_series() -> GeoSeries {
    let geoms = vec![
        Some(line_string![(x: 0., y: 0.), (x: 2., y: 2.)].into()),
        Some(
            line_string![
                (x: 0., y: 0.),
                (x: 1., y: 0.),
                (x: 1., y: 1.),
                (x: 0., y: 1.),
                (x: 0., y: 0.)
            ]
            .into(),
        ),
    ];
    GeoSeries::try_from_geometries(&geoms, None).unwrap()
}

/// A square around the first points of [`point_series`] and a strip covering the rest.
pub(crate) fn zone_series() -> GeoSeries {
    let geoms = vec![
        Some(
            polygon![(x: 0.5, y: 0.5), (x: 2.5, y: 0.5), (x: 2.5, y: 2.5), (x: 0.5, y: 2.5)]
                .into(),
        ),
        Some(polygon![(x: 2.5, y: 0.), (x: 5., y: 0.), (x: 5., y: 5.), (x: 2.5, y: 5.)].into()),
    ];
    GeoSeries::try_from_geometries(&geoms, Some("EPSG:4326".to_string())).unwrap()
}
