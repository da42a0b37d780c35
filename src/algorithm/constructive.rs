//! Operations that build a new geometry from every geometry of a frame.
//!
//! Each operation returns a new [`GeoDataFrame`] holding the frame's active rows with the
//! geometry column replaced. Use [`GeoDataFrame::set_geometry`] on a frame to apply a result in
//! place. Null geometries stay null.

use geo::{
    BooleanOps, BoundingRect, Centroid, ConvexHull, Geometry, GeometryCollection,
    InteriorPoint, Intersects, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, Rect, Simplify,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::GeoDataFrame;
use crate::series::unique_points;

#[cfg(feature = "geos")]
use crate::geometry::GeometryInput;

/// End cap style of a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapStyle {
    #[default]
    Round,
    Flat,
    Square,
}

/// Corner style of a buffer or offset curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStyle {
    #[default]
    Round,
    Mitre,
    Bevel,
}

/// Parameters of [`Constructive::buffer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferOptions {
    pub radius: f64,
    /// Segments used to approximate a quarter circle.
    pub quadsegs: i32,
    pub cap_style: CapStyle,
    pub join_style: JoinStyle,
    pub mitre_limit: f64,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            radius: 0.,
            quadsegs: 8,
            cap_style: CapStyle::Round,
            join_style: JoinStyle::Round,
            mitre_limit: 5.0,
        }
    }
}

/// Constructive operations on the geometry of a [`GeoDataFrame`].
#[derive(Debug, Clone, Copy)]
pub struct Constructive<'a> {
    frame: &'a GeoDataFrame,
}

impl<'a> Constructive<'a> {
    pub fn new(frame: &'a GeoDataFrame) -> Self {
        Self { frame }
    }

    fn map<F>(&self, op: F) -> Result<GeoDataFrame>
    where
        F: Fn(Geometry) -> Result<Option<Geometry>> + Sync + Send,
    {
        let geometry = self.frame.geometry().try_map_geo(op)?;
        self.frame.with_geometry(geometry)
    }

    /// Topological boundary: rings of polygons, end points of open lines, nothing for points.
    pub fn boundary(&self) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(Some(boundary(&geom))))
    }

    /// Centroid of every geometry. Empty geometries produce nulls.
    pub fn centroid(&self) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(geom.centroid().map(Geometry::Point)))
    }

    /// Part of every geometry inside the rectangle.
    ///
    /// # Examples
    ///
    /// ```
    /// use geo::Area;
    /// use geoframe::{GeoDataFrame, GeoSeries};
    ///
    /// let series = GeoSeries::try_from_wkt(&["POLYGON((0 0,4 0,4 4,0 4,0 0))"], None).unwrap();
    /// let frame = GeoDataFrame::from_geometry(series);
    /// let clipped = frame.constructive().clip_by_rect(1., 1., 3., 2.).unwrap();
    /// let geom = clipped.geometry().value(0).unwrap().unwrap();
    /// assert_eq!(geom.unsigned_area(), 2.0);
    /// ```
    pub fn clip_by_rect(&self, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<GeoDataFrame> {
        let rect = Rect::new((xmin, ymin), (xmax, ymax));
        self.map(|geom| Ok(Some(clip_by_rect(&geom, &rect))))
    }

    pub fn convex_hull(&self) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(Some(Geometry::Polygon(geom.convex_hull()))))
    }

    /// Bounding rectangle of every geometry, as a polygon, or a point when it is degenerate.
    pub fn envelope(&self) -> Result<GeoDataFrame> {
        self.map(|geom| {
            Ok(geom.bounding_rect().map(|rect| {
                if rect.width() == 0. && rect.height() == 0. {
                    Geometry::Point(rect.min().into())
                } else {
                    Geometry::Polygon(rect.to_polygon())
                }
            }))
        })
    }

    /// Distinct vertices of every geometry as a multi point.
    pub fn extract_unique_points(&self) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(Some(Geometry::MultiPoint(unique_points(&geom)))))
    }

    /// A point guaranteed to lie on every geometry.
    pub fn point_on_surface(&self) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(geom.interior_point().map(Geometry::Point)))
    }

    /// Reverse the vertex order of every line and ring.
    pub fn reverse(&self) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(Some(reverse(geom))))
    }

    /// Ramer-Douglas-Peucker simplification. Points are returned unchanged.
    pub fn simplify(&self, tolerance: f64) -> Result<GeoDataFrame> {
        self.map(|geom| Ok(Some(simplify(geom, tolerance))))
    }

    #[cfg(feature = "geos")]
    pub fn buffer(&self, options: &BufferOptions) -> Result<GeoDataFrame> {
        self.map(|geom| crate::algorithm::geos::buffer(&geom, options).map(Some))
    }

    /// Polygons formed by the linework of every geometry.
    #[cfg(feature = "geos")]
    pub fn build_area(&self) -> Result<GeoDataFrame> {
        self.map(|geom| crate::algorithm::geos::build_area(&geom).map(Some))
    }

    #[cfg(feature = "geos")]
    pub fn delaunay_triangles(&self, tolerance: f64, only_edges: bool) -> Result<GeoDataFrame> {
        self.map(|geom| {
            crate::algorithm::geos::delaunay_triangles(&geom, tolerance, only_edges).map(Some)
        })
    }

    #[cfg(feature = "geos")]
    pub fn make_valid(&self) -> Result<GeoDataFrame> {
        self.map(|geom| crate::algorithm::geos::make_valid(&geom).map(Some))
    }

    /// Rewrite every geometry into its canonical form.
    #[cfg(feature = "geos")]
    pub fn normalize(&self) -> Result<GeoDataFrame> {
        self.map(|geom| crate::algorithm::geos::normalize(&geom).map(Some))
    }

    /// Line parallel to every line at `distance`, on the left for positive distances.
    #[cfg(feature = "geos")]
    pub fn offset_curve(
        &self,
        distance: f64,
        quadsegs: i32,
        join_style: JoinStyle,
        mitre_limit: f64,
    ) -> Result<GeoDataFrame> {
        self.map(|geom| {
            crate::algorithm::geos::offset_curve(&geom, distance, quadsegs, join_style, mitre_limit)
                .map(Some)
        })
    }

    /// Simplification that never changes topology.
    #[cfg(feature = "geos")]
    pub fn simplify_preserve_topology(&self, tolerance: f64) -> Result<GeoDataFrame> {
        self.map(|geom| crate::algorithm::geos::simplify_preserve_topology(&geom, tolerance).map(Some))
    }

    /// Snap the vertices of every geometry to `reference` within `tolerance`.
    #[cfg(feature = "geos")]
    pub fn snap(&self, reference: impl Into<GeometryInput>, tolerance: f64) -> Result<GeoDataFrame> {
        let reference = reference.into().to_geo()?;
        self.map(|geom| crate::algorithm::geos::snap(&geom, &reference, tolerance).map(Some))
    }

    /// Voronoi diagram of the vertices of every geometry, optionally extended to cover
    /// `extend_to`.
    #[cfg(feature = "geos")]
    pub fn voronoi_polygons(
        &self,
        tolerance: f64,
        extend_to: Option<GeometryInput>,
        only_edges: bool,
    ) -> Result<GeoDataFrame> {
        let extend_to = extend_to.map(|geom| geom.to_geo()).transpose()?;
        self.map(|geom| {
            crate::algorithm::geos::voronoi_polygons(&geom, tolerance, extend_to.as_ref(), only_edges)
                .map(Some)
        })
    }
}

fn boundary(geom: &Geometry) -> Geometry {
    fn rings(polygon: &Polygon) -> Vec<LineString> {
        std::iter::once(polygon.exterior().clone())
            .chain(polygon.interiors().iter().cloned())
            .collect()
    }

    fn line_ends(lines: &[LineString]) -> MultiPoint {
        // Mod-2 rule: end points shared by an even number of lines are interior
        let mut ends: Vec<(Point, usize)> = Vec::new();
        for ls in lines.iter().filter(|ls| !ls.is_closed()) {
            for coord in [ls.0.first(), ls.0.last()].into_iter().flatten() {
                let point = Point::from(*coord);
                match ends.iter_mut().find(|(p, _)| *p == point) {
                    Some((_, count)) => *count += 1,
                    None => ends.push((point, 1)),
                }
            }
        }
        ends.into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .map(|(point, _)| point)
            .collect()
    }

    fn from_rings(rings: Vec<LineString>) -> Geometry {
        match rings.len() {
            1 => rings.into_iter().map(Geometry::LineString).next().unwrap_or_else(empty),
            _ => Geometry::MultiLineString(MultiLineString::new(rings)),
        }
    }

    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => empty(),
        Geometry::Line(l) => Geometry::MultiPoint(vec![Point::from(l.start), Point::from(l.end)].into()),
        Geometry::LineString(ls) => Geometry::MultiPoint(line_ends(std::slice::from_ref(ls))),
        Geometry::MultiLineString(mls) => Geometry::MultiPoint(line_ends(&mls.0)),
        Geometry::Polygon(p) => from_rings(rings(p)),
        Geometry::MultiPolygon(mp) => Geometry::MultiLineString(MultiLineString::new(
            mp.iter().flat_map(rings).collect(),
        )),
        Geometry::Rect(r) => from_rings(rings(&r.to_polygon())),
        Geometry::Triangle(t) => from_rings(rings(&t.to_polygon())),
        Geometry::GeometryCollection(gc) => {
            Geometry::GeometryCollection(gc.iter().map(boundary).collect())
        }
    }
}

fn empty() -> Geometry {
    Geometry::GeometryCollection(GeometryCollection::new_from(vec![]))
}

fn clip_by_rect(geom: &Geometry, rect: &Rect) -> Geometry {
    let clip = MultiPolygon::new(vec![rect.to_polygon()]);
    let clip_polygons = |polygons: MultiPolygon| Geometry::MultiPolygon(polygons.intersection(&clip));
    let clip_lines = |lines: MultiLineString| {
        Geometry::MultiLineString(rect.to_polygon().clip(&lines, false))
    };
    let keep_points = |points: Vec<Point>| {
        Geometry::MultiPoint(
            points
                .into_iter()
                .filter(|p| rect.intersects(p))
                .collect::<Vec<_>>()
                .into(),
        )
    };

    match geom.clone() {
        Geometry::Point(p) => keep_points(vec![p]),
        Geometry::MultiPoint(mp) => keep_points(mp.0),
        Geometry::Line(l) => clip_lines(MultiLineString::new(vec![l.into()])),
        Geometry::LineString(ls) => clip_lines(MultiLineString::new(vec![ls])),
        Geometry::MultiLineString(mls) => clip_lines(mls),
        Geometry::Polygon(p) => clip_polygons(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => clip_polygons(mp),
        Geometry::Rect(r) => clip_polygons(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => clip_polygons(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
            gc.iter().map(|g| clip_by_rect(g, rect)).collect(),
        ),
    }
}

fn reverse(geom: Geometry) -> Geometry {
    fn reverse_line(mut ls: LineString) -> LineString {
        ls.0.reverse();
        ls
    }

    fn reverse_polygon(polygon: Polygon) -> Polygon {
        let (exterior, interiors) = polygon.into_inner();
        Polygon::new(
            reverse_line(exterior),
            interiors.into_iter().map(reverse_line).collect(),
        )
    }

    match geom {
        Geometry::Line(l) => Geometry::Line(geo::Line::new(l.end, l.start)),
        Geometry::LineString(ls) => Geometry::LineString(reverse_line(ls)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
            mls.into_iter().map(reverse_line).collect(),
        )),
        Geometry::Polygon(p) => Geometry::Polygon(reverse_polygon(p)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
            mp.into_iter().map(reverse_polygon).collect(),
        )),
        Geometry::Rect(r) => Geometry::Polygon(reverse_polygon(r.to_polygon())),
        Geometry::Triangle(t) => Geometry::Polygon(reverse_polygon(t.to_polygon())),
        Geometry::GeometryCollection(gc) => {
            Geometry::GeometryCollection(gc.into_iter().map(reverse).collect())
        }
        points @ (Geometry::Point(_) | Geometry::MultiPoint(_)) => points,
    }
}

fn simplify(geom: Geometry, tolerance: f64) -> Geometry {
    match geom {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(&tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(&tolerance)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify(&tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&tolerance)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
            gc.into_iter().map(|g| simplify(g, tolerance)).collect(),
        ),
        other => other,
    }
}
