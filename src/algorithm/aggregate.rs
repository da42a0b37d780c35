//! Reductions of many geometries into one.

use std::collections::{HashMap, VecDeque};

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
    BooleanOps, BoundingRect, ConvexHull, Coord, CoordsIter, Geometry, GeometryCollection,
    Intersects, Line, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
    Rect,
};

/// Bounding rectangle enclosing every geometry, `None` if all of them are empty.
pub fn total_bounds<'a>(geoms: impl IntoIterator<Item = &'a Geometry>) -> Option<Rect> {
    geoms
        .into_iter()
        .filter_map(|geom| geom.bounding_rect())
        .reduce(|acc, rect| {
            Rect::new(
                (acc.min().x.min(rect.min().x), acc.min().y.min(rect.min().y)),
                (acc.max().x.max(rect.max().x), acc.max().y.max(rect.max().y)),
            )
        })
}

/// Convex hull of every vertex of every geometry, `None` if there are no vertices.
pub fn convex_hull_all<'a>(geoms: impl IntoIterator<Item = &'a Geometry>) -> Option<Polygon> {
    let points: Vec<Point> = geoms
        .into_iter()
        .flat_map(|geom| geom.coords_iter())
        .map(Point::from)
        .collect();
    if points.is_empty() {
        return None;
    }
    Some(MultiPoint::new(points).convex_hull())
}

/// Union of a set of geometries.
///
/// Areal inputs are dissolved with boolean operations. Lines are clipped to the outside of
/// the dissolved area, noded at their intersections and overlaps, deduplicated and merged
/// back into maximal line strings. Points lying on the area or on a line are dropped and the
/// rest deduplicated. When more than one of these kinds remains the result is a collection
/// holding one member per kind.
pub fn union_all(geoms: impl IntoIterator<Item = Geometry>) -> Option<Geometry> {
    let mut parts = Parts::default();
    for geom in geoms {
        parts.push(geom);
    }

    let polygons = parts.polygons.filter(|mp| !mp.0.is_empty());
    let mut lines = MultiLineString::new(parts.lines);
    if let Some(polygons) = &polygons {
        lines = polygons.clip(&lines, true);
    }
    let segments = node_segments(&lines);

    let mut points: Vec<Point> = Vec::with_capacity(parts.points.len());
    for point in parts.points {
        let covered = polygons.as_ref().is_some_and(|mp| mp.intersects(&point))
            || segments.iter().any(|segment| segment.intersects(&point));
        if !covered && !points.contains(&point) {
            points.push(point);
        }
    }

    let mut output: Vec<Geometry> = Vec::new();
    if let Some(polygons) = polygons {
        output.push(Geometry::MultiPolygon(polygons));
    }
    if !segments.is_empty() {
        output.push(Geometry::MultiLineString(MultiLineString::new(
            merge_segments(segments),
        )));
    }
    if !points.is_empty() {
        output.push(Geometry::MultiPoint(MultiPoint::new(points)));
    }

    match output.len() {
        0 => None,
        1 => output.pop(),
        _ => Some(Geometry::GeometryCollection(GeometryCollection::new_from(
            output,
        ))),
    }
}

#[derive(Default)]
struct Parts {
    polygons: Option<MultiPolygon>,
    lines: Vec<LineString>,
    points: Vec<Point>,
}

impl Parts {
    fn push(&mut self, geom: Geometry) {
        match geom {
            Geometry::Point(p) => self.points.push(p),
            Geometry::MultiPoint(mp) => self.points.extend(mp.0),
            Geometry::Line(l) => self.lines.push(l.into()),
            Geometry::LineString(ls) => self.lines.push(ls),
            Geometry::MultiLineString(mls) => self.lines.extend(mls.0),
            Geometry::Polygon(p) => self.add_polygons(MultiPolygon::new(vec![p])),
            Geometry::Rect(r) => self.add_polygons(MultiPolygon::new(vec![r.to_polygon()])),
            Geometry::Triangle(t) => self.add_polygons(MultiPolygon::new(vec![t.to_polygon()])),
            Geometry::MultiPolygon(mp) => self.add_polygons(mp),
            Geometry::GeometryCollection(gc) => {
                for member in gc {
                    self.push(member);
                }
            }
        }
    }

    fn add_polygons(&mut self, other: MultiPolygon) {
        self.polygons = Some(match self.polygons.take() {
            Some(acc) => acc.union(&other),
            None => other,
        });
    }
}

/// Split every segment at the points where it meets another one and drop repeated pieces.
fn node_segments(lines: &MultiLineString) -> Vec<Line> {
    let segments: Vec<Line> = lines
        .0
        .iter()
        .flat_map(|ls| ls.lines())
        .filter(|l| l.start != l.end)
        .collect();

    let mut noded: Vec<Line> = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let mut cuts: Vec<Coord> = Vec::new();
        for (j, other) in segments.iter().enumerate() {
            if i == j {
                continue;
            }
            match line_intersection(*segment, *other) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => cuts.push(intersection),
                Some(LineIntersection::Collinear { intersection }) => {
                    cuts.push(intersection.start);
                    cuts.push(intersection.end);
                }
                None => {}
            }
        }

        let delta = segment.delta();
        let length_sq = delta.x * delta.x + delta.y * delta.y;
        let position = |c: &Coord| {
            ((c.x - segment.start.x) * delta.x + (c.y - segment.start.y) * delta.y) / length_sq
        };
        cuts.retain(|c| {
            let t = position(c);
            t > 0. && t < 1.
        });
        cuts.sort_by(|a, b| position(a).total_cmp(&position(b)));

        let mut vertices = vec![segment.start];
        vertices.extend(cuts);
        vertices.push(segment.end);
        vertices.dedup();
        for pair in vertices.windows(2) {
            let piece = normalized(Line::new(pair[0], pair[1]));
            if !noded.contains(&piece) {
                noded.push(piece);
            }
        }
    }
    noded
}

fn normalized(line: Line) -> Line {
    if (line.end.x, line.end.y) < (line.start.x, line.start.y) {
        Line::new(line.end, line.start)
    } else {
        line
    }
}

/// Join segments into line strings through every vertex shared by exactly two of them.
fn merge_segments(segments: Vec<Line>) -> Vec<LineString> {
    let key = |c: Coord| (c.x.to_bits(), c.y.to_bits());
    let mut incident: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (i, segment) in segments.iter().enumerate() {
        incident.entry(key(segment.start)).or_default().push(i);
        incident.entry(key(segment.end)).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let next_from = |vertex: Coord, used: &mut [bool]| -> Option<Coord> {
        let candidates = incident.get(&key(vertex))?;
        if candidates.len() != 2 {
            return None;
        }
        let j = *candidates.iter().find(|&&j| !used[j])?;
        used[j] = true;
        let segment = segments[j];
        Some(if segment.start == vertex {
            segment.end
        } else {
            segment.start
        })
    };

    let mut merged = Vec::new();
    for i in 0..segments.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut coords = VecDeque::from([segments[i].start, segments[i].end]);
        while let Some(&back) = coords.back() {
            match next_from(back, &mut used[..]) {
                Some(c) => coords.push_back(c),
                None => break,
            }
        }
        while let Some(&front) = coords.front() {
            match next_from(front, &mut used[..]) {
                Some(c) => coords.push_front(c),
                None => break,
            }
        }
        merged.push(LineString::new(coords.into_iter().collect()));
    }
    merged
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, point, polygon, Area, EuclideanLength};

    #[test]
    fn bounds_of_mixed_geometries() {
        let geoms: Vec<Geometry> = vec![
            point!(x: 1., y: 5.).into(),
            line_string![(x: -2., y: 0.), (x: 3., y: 1.)].into(),
        ];
        let rect = total_bounds(&geoms).unwrap();
        assert_eq!(rect.min().x, -2.);
        assert_eq!(rect.min().y, 0.);
        assert_eq!(rect.max().x, 3.);
        assert_eq!(rect.max().y, 5.);
        assert!(total_bounds(&Vec::new()).is_none());
    }

    #[test]
    fn hull_of_points() {
        let geoms: Vec<Geometry> = vec![
            point!(x: 0., y: 0.).into(),
            point!(x: 2., y: 0.).into(),
            point!(x: 2., y: 2.).into(),
            point!(x: 1., y: 1.).into(),
        ];
        let hull = convex_hull_all(&geoms).unwrap();
        assert_relative_eq!(hull.unsigned_area(), 2.0);
    }

    #[test]
    fn union_dissolves_polygons() {
        let geoms: Vec<Geometry> = vec![
            polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 2.), (x: 0., y: 2.)].into(),
            polygon![(x: 1., y: 0.), (x: 3., y: 0.), (x: 3., y: 2.), (x: 1., y: 2.)].into(),
        ];
        match union_all(geoms) {
            Some(Geometry::MultiPolygon(mp)) => {
                assert_eq!(mp.0.len(), 1);
                assert_relative_eq!(mp.unsigned_area(), 6.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn union_of_mixed_kinds() {
        let geoms: Vec<Geometry> = vec![
            point!(x: 5., y: 5.).into(),
            point!(x: 5., y: 5.).into(),
            point!(x: 0., y: 0.).into(),
            line_string![(x: 0., y: 0.), (x: 1., y: 1.)].into(),
        ];
        match union_all(geoms) {
            Some(Geometry::GeometryCollection(gc)) => {
                assert_eq!(gc.0.len(), 2);
                assert_eq!(
                    gc.0[0],
                    Geometry::MultiLineString(MultiLineString::new(vec![
                        line_string![(x: 0., y: 0.), (x: 1., y: 1.)]
                    ]))
                );
                assert_eq!(gc.0[1], Geometry::MultiPoint(vec![point!(x: 5., y: 5.)].into()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(union_all(Vec::new()).is_none());
    }

    #[test]
    fn union_absorbs_covered_parts() {
        let square: Geometry =
            polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 2.), (x: 0., y: 2.)].into();
        let geoms = vec![
            square.clone(),
            point!(x: 1., y: 1.).into(),
            line_string![(x: 0.5, y: 0.5), (x: 1.5, y: 1.5)].into(),
        ];
        match union_all(geoms) {
            Some(Geometry::MultiPolygon(mp)) => assert_relative_eq!(mp.unsigned_area(), 4.0),
            other => panic!("unexpected {other:?}"),
        }

        let crossing = vec![square, line_string![(x: 1., y: 1.), (x: 4., y: 1.)].into()];
        match union_all(crossing) {
            Some(Geometry::GeometryCollection(gc)) => match &gc.0[1] {
                Geometry::MultiLineString(mls) => {
                    assert_eq!(mls.0.len(), 1);
                    assert_relative_eq!(mls.euclidean_length(), 2.0);
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn union_merges_overlapping_lines() {
        let geoms: Vec<Geometry> = vec![
            line_string![(x: 0., y: 0.), (x: 2., y: 0.)].into(),
            line_string![(x: 1., y: 0.), (x: 3., y: 0.)].into(),
            line_string![(x: 3., y: 0.), (x: 2., y: 0.)].into(),
        ];
        match union_all(geoms) {
            Some(Geometry::MultiLineString(mls)) => {
                assert_eq!(mls.0.len(), 1);
                assert_relative_eq!(mls.euclidean_length(), 3.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        let cross: Vec<Geometry> = vec![
            line_string![(x: 0., y: 0.), (x: 2., y: 2.)].into(),
            line_string![(x: 0., y: 2.), (x: 2., y: 0.)].into(),
        ];
        match union_all(cross) {
            Some(Geometry::MultiLineString(mls)) => {
                assert_eq!(mls.0.len(), 4);
                assert_relative_eq!(mls.euclidean_length(), 4.0 * 2f64.sqrt());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
