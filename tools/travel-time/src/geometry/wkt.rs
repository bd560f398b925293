//! Minimal WKT helpers: synthesize a POINT, read back a first coordinate

use super::Point;

/// Largest precision that still changes an f64's printed value
pub const MAX_WKT_PRECISION: usize = 17;

/// `POINT(<lon> <lat>)` with a fixed number of decimals
pub fn point_text(point: Point, precision: usize) -> String {
    let precision = precision.min(MAX_WKT_PRECISION);
    format!("POINT({:.precision$} {:.precision$})", point.lon, point.lat)
}

/// First coordinate of a WKT or EWKT geometry.
///
/// Non-point geometries degrade to their first vertex; there is no centroid
/// math. `SRID=...;` prefixes and Z/M ordinates are tolerated.
pub fn first_coordinate(text: &str) -> Option<Point> {
    let open = text.find('(')?;
    let body = text[open..].trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let end = body.find([',', ')']).unwrap_or(body.len());

    let mut ordinates = body[..end].split_whitespace().map(str::parse::<f64>);
    let lon = ordinates.next()?.ok()?;
    let lat = ordinates.next()?.ok()?;
    Some(Point::new(lon, lat))
}
