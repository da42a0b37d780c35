//! Join random points to a grid of square zones and print the result.
//!
//! Run with `RUST_LOG=debug cargo run --example spatial_join` to see the join planning.

use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, StringArray};
use geo::{polygon, Geometry, Point};
use geoframe::algorithm::{JoinHow, SpatialJoinOptions, SpatialPredicate};
use geoframe::error::Result;
use geoframe::{sjoin, GeoDataFrame, GeoSeries};
use tracing_subscriber::EnvFilter;

fn zones() -> Result<GeoDataFrame> {
    let mut geoms = Vec::new();
    let mut names = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            let (x, y) = (i as f64 * 25., j as f64 * 25.);
            geoms.push(Some(Geometry::Polygon(polygon![
                (x: x, y: y),
                (x: x + 25., y: y),
                (x: x + 25., y: y + 25.),
                (x: x, y: y + 25.),
            ])));
            names.push(format!("zone-{i}-{j}"));
        }
    }
    let series = GeoSeries::try_from_geometries(&geoms, Some("EPSG:3857".to_string()))?;
    let names: ArrayRef = Arc::new(StringArray::from(names));
    GeoDataFrame::from_geometry(series).add_column("zone", names)
}

fn points(n: usize) -> Result<GeoDataFrame> {
    // Deterministic scatter over [0, 100)
    let geoms: Vec<Option<Geometry>> = (0..n)
        .map(|i| {
            let x = (i as f64 * 37.17) % 100.;
            let y = (i as f64 * 71.31) % 100.;
            Some(Geometry::Point(Point::new(x, y)))
        })
        .collect();
    let series = GeoSeries::try_from_geometries(&geoms, Some("EPSG:3857".to_string()))?;
    let ids: ArrayRef = Arc::new(Int64Array::from_iter_values(0..n as i64));
    GeoDataFrame::from_geometry(series).add_column("id", ids)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let points = points(1000)?;
    let zones = zones()?;
    println!("{points}");

    let options = SpatialJoinOptions {
        how: JoinHow::Inner,
        predicate: SpatialPredicate::Within,
        ..Default::default()
    };
    let joined = sjoin(&points, &zones, &options)?;
    println!("{joined}");

    let near = sjoin(
        &points,
        &zones,
        &SpatialJoinOptions {
            predicate: SpatialPredicate::DWithin(5.),
            ..options
        },
    )?;
    println!("{} point and zone pairs within 5 units", near.len());
    Ok(())
}
