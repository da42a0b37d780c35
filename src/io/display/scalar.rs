use geo::{Geometry, MapCoords};
use geozero::ToWkt;

/// Longest geometry text shown in a table cell, brackets included.
pub(crate) const DEFAULT_MAX_WIDTH: usize = 75;

/// Render a geometry as `<WKT>` with coordinates rounded to 3 decimals.
///
/// Text longer than `max_width` is cut and ends in `...>`.
pub(crate) fn format_geometry(geom: &Geometry, max_width: usize) -> String {
    // Truncate to max 3 decimal points
    let truncated = geom.map_coords(|geo::Coord { x, y }| geo::Coord {
        x: (x * 1000.0).round() / 1000.0,
        y: (y * 1000.0).round() / 1000.0,
    });
    let wkt = match truncated.to_wkt() {
        Ok(wkt) => wkt,
        Err(_) => return "<invalid>".to_string(),
    };
    let text = format!("<{wkt}>");
    if text.chars().count() <= max_width || max_width < 5 {
        return text;
    }
    let mut cut: String = text.chars().take(max_width - 4).collect();
    cut.push_str("...>");
    cut
}
