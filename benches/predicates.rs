use criterion::{criterion_group, criterion_main, Criterion};
use geo::{Geometry, Point};
use geoframe::algorithm::{JoinHow, Predicates, SpatialJoinOptions, SpatialPredicate};
use geoframe::{sjoin, GeoDataFrame, GeoSeries};

fn scattered_points(n: usize) -> GeoSeries {
    let geoms: Vec<Option<Geometry>> = (0..n)
        .map(|i| {
            let x = (i as f64 * 37.17) % 100.;
            let y = (i as f64 * 71.31) % 100.;
            Some(Geometry::Point(Point::new(x, y)))
        })
        .collect();
    GeoSeries::try_from_geometries(&geoms, None).unwrap()
}

fn grid(cells: usize) -> GeoSeries {
    let size = 100. / cells as f64;
    let mut wkt = Vec::with_capacity(cells * cells);
    for i in 0..cells {
        for j in 0..cells {
            let (x, y) = (i as f64 * size, j as f64 * size);
            wkt.push(format!(
                "POLYGON(({x} {y},{} {y},{} {},{x} {},{x} {y}))",
                x + size,
                x + size,
                y + size,
                y + size
            ));
        }
    }
    let refs: Vec<&str> = wkt.iter().map(String::as_str).collect();
    GeoSeries::try_from_wkt(&refs, None).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let points = scattered_points(100_000);
    let zone = "POLYGON((10 10,60 10,60 60,10 60,10 10))";

    c.bench_function("within polygon, 100k points", |b| {
        b.iter(|| Predicates::new(&points).within(zone).unwrap())
    });

    c.bench_function("intersects polygon, 100k points, chunks of 10k", |b| {
        b.iter(|| {
            Predicates::new(&points)
                .with_chunk_size(10_000)
                .intersects(zone)
                .unwrap()
        })
    });

    let left = GeoDataFrame::from_geometry(scattered_points(20_000));
    let right = GeoDataFrame::from_geometry(grid(20));
    let options = SpatialJoinOptions {
        how: JoinHow::Inner,
        predicate: SpatialPredicate::Within,
        ..Default::default()
    };
    c.bench_function("sjoin 20k points within 400 cells", |b| {
        b.iter(|| sjoin(&left, &right, &options).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
