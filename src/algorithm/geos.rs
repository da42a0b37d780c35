//! Bindings to the [`geos`] crate for operations `geo` does not provide.
//!
//! Geometries cross the boundary as WKB.

use geo::{Geometry, GeometryCollection};
use geos::Geom;

use crate::algorithm::constructive::{BufferOptions, CapStyle, JoinStyle};
use crate::error::Result;
use crate::geometry::{from_wkb, to_wkb};

pub(crate) fn to_geos(geom: &Geometry) -> Result<geos::Geometry> {
    Ok(geos::Geometry::new_from_wkb(&to_wkb(geom)?)?)
}

pub(crate) fn from_geos(geom: geos::Geometry) -> Result<Geometry> {
    let wkb = geom.to_wkb()?;
    from_wkb(&wkb)
}

impl From<CapStyle> for geos::CapStyle {
    fn from(value: CapStyle) -> Self {
        match value {
            CapStyle::Round => geos::CapStyle::Round,
            CapStyle::Flat => geos::CapStyle::Flat,
            CapStyle::Square => geos::CapStyle::Square,
        }
    }
}

impl From<JoinStyle> for geos::JoinStyle {
    fn from(value: JoinStyle) -> Self {
        match value {
            JoinStyle::Round => geos::JoinStyle::Round,
            JoinStyle::Mitre => geos::JoinStyle::Mitre,
            JoinStyle::Bevel => geos::JoinStyle::Bevel,
        }
    }
}

/// Dissolve every geometry into one with GEOS `unary_union`.
pub(crate) fn unary_union(geoms: Vec<Geometry>) -> Result<Option<Geometry>> {
    if geoms.is_empty() {
        return Ok(None);
    }
    let collection = Geometry::GeometryCollection(GeometryCollection::new_from(geoms));
    let union = to_geos(&collection)?.unary_union()?;
    if union.is_empty()? {
        return Ok(None);
    }
    Ok(Some(from_geos(union)?))
}

pub(crate) fn is_valid(geom: &Geometry) -> Result<bool> {
    Ok(to_geos(geom)?.is_valid())
}

pub(crate) fn is_simple(geom: &Geometry) -> Result<bool> {
    Ok(to_geos(geom)?.is_simple()?)
}

pub(crate) fn is_ring(geom: &Geometry) -> Result<bool> {
    Ok(to_geos(geom)?.is_ring()?)
}

pub(crate) fn minimum_clearance(geom: &Geometry) -> Result<f64> {
    Ok(to_geos(geom)?.minimum_clearance()?)
}

pub(crate) fn buffer(geom: &Geometry, options: &BufferOptions) -> Result<Geometry> {
    let buffered = to_geos(geom)?.buffer_with_style(
        options.radius,
        options.quadsegs,
        options.cap_style.into(),
        options.join_style.into(),
        options.mitre_limit,
    )?;
    from_geos(buffered)
}

pub(crate) fn build_area(geom: &Geometry) -> Result<Geometry> {
    from_geos(to_geos(geom)?.build_area()?)
}

pub(crate) fn delaunay_triangles(
    geom: &Geometry,
    tolerance: f64,
    only_edges: bool,
) -> Result<Geometry> {
    from_geos(to_geos(geom)?.delaunay_triangulation(tolerance, only_edges)?)
}

pub(crate) fn make_valid(geom: &Geometry) -> Result<Geometry> {
    from_geos(to_geos(geom)?.make_valid()?)
}

pub(crate) fn normalize(geom: &Geometry) -> Result<Geometry> {
    let mut geos_geom = to_geos(geom)?;
    geos_geom.normalize()?;
    from_geos(geos_geom)
}

pub(crate) fn offset_curve(
    geom: &Geometry,
    distance: f64,
    quadsegs: i32,
    join_style: JoinStyle,
    mitre_limit: f64,
) -> Result<Geometry> {
    let offset = to_geos(geom)?.offset_curve(distance, quadsegs, join_style.into(), mitre_limit)?;
    from_geos(offset)
}

pub(crate) fn simplify_preserve_topology(geom: &Geometry, tolerance: f64) -> Result<Geometry> {
    from_geos(to_geos(geom)?.topology_preserve_simplify(tolerance)?)
}

pub(crate) fn snap(geom: &Geometry, reference: &Geometry, tolerance: f64) -> Result<Geometry> {
    from_geos(to_geos(geom)?.snap(&to_geos(reference)?, tolerance)?)
}

pub(crate) fn voronoi_polygons(
    geom: &Geometry,
    tolerance: f64,
    extend_to: Option<&Geometry>,
    only_edges: bool,
) -> Result<Geometry> {
    let extend_to = extend_to.map(to_geos).transpose()?;
    from_geos(to_geos(geom)?.voronoi(extend_to.as_ref(), tolerance, only_edges)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, point, polygon, Area};

    #[test]
    fn validity() {
        let bowtie: Geometry =
            polygon![(x: 0., y: 0.), (x: 2., y: 2.), (x: 2., y: 0.), (x: 0., y: 2.)].into();
        assert!(!is_valid(&bowtie).unwrap());
        let fixed = make_valid(&bowtie).unwrap();
        assert!(is_valid(&fixed).unwrap());
        assert_relative_eq!(fixed.unsigned_area(), 2.0);
    }

    #[test]
    fn ring_and_simple() {
        let ring: Geometry =
            line_string![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 0.)].into();
        assert!(is_ring(&ring).unwrap());
        assert!(is_simple(&ring).unwrap());
        let open: Geometry = line_string![(x: 0., y: 0.), (x: 1., y: 0.)].into();
        assert!(!is_ring(&open).unwrap());
    }

    #[test]
    fn buffer_point() {
        let options = BufferOptions {
            radius: 1.0,
            quadsegs: 16,
            ..Default::default()
        };
        let buffered = buffer(&point!(x: 0., y: 0.).into(), &options).unwrap();
        assert_relative_eq!(buffered.unsigned_area(), std::f64::consts::PI, epsilon = 0.02);

        let square = BufferOptions {
            radius: 1.0,
            cap_style: CapStyle::Square,
            ..Default::default()
        };
        let buffered = buffer(&point!(x: 0., y: 0.).into(), &square).unwrap();
        assert_relative_eq!(buffered.unsigned_area(), 4.0);
    }

    #[test]
    fn union_absorbs_interior_point() {
        let square: Geometry =
            polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 2.), (x: 0., y: 2.)].into();
        let union = unary_union(vec![square, point!(x: 1., y: 1.).into()])
            .unwrap()
            .unwrap();
        assert!(matches!(union, Geometry::Polygon(_)));
        assert_relative_eq!(union.unsigned_area(), 4.0);
        assert!(unary_union(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn clearance_of_point_is_infinite() {
        let clearance = minimum_clearance(&point!(x: 0., y: 0.).into()).unwrap();
        assert!(clearance.is_infinite());
    }
}
