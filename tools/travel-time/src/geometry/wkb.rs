//! WKB (Well-Known Binary) encoding for route geometry
//!
//! Routes are returned as a LineString in little-endian WKB so GIS tools
//! (PostGIS, QGIS, Shapely, GeoPandas, ...) can read them directly.
//!
//! ## WKB LineString Format
//!
//! ```text
//! byte order: 1 byte (little-endian = 1)
//! type: 4 bytes (linestring = 2)
//! num_points: 4 bytes
//! for each point:
//!   x: 8 bytes (f64, longitude)
//!   y: 8 bytes (f64, latitude)
//! ```

use super::Point;

/// WKB byte-order marker for little-endian
pub const WKB_LITTLE_ENDIAN: u8 = 1;

/// WKB geometry type code for LineString
pub const WKB_LINESTRING: u32 = 2;

/// Header bytes before the first coordinate: order + type + count
pub const LINESTRING_HEADER_LEN: usize = 9;

const EWKB_SRID_FLAG: u32 = 0x2000_0000;
const GEOMETRY_TYPE_MASK: u32 = 0x0FFF_FFFF;
const MAX_NESTING: usize = 8;

/// Encode an ordered point sequence as a WKB LineString.
///
/// Returns an empty buffer for zero points; callers treat that as a null
/// geometry, never as an empty LineString.
pub fn encode_linestring(points: &[Point]) -> Vec<u8> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut buf = Vec::with_capacity(LINESTRING_HEADER_LEN + points.len() * 16);

    // Byte order: 1 = little-endian
    buf.push(WKB_LITTLE_ENDIAN);

    // Type: 2 = LineString
    buf.extend_from_slice(&WKB_LINESTRING.to_le_bytes());

    // Number of points
    buf.extend_from_slice(&(points.len() as u32).to_le_bytes());

    for point in points {
        buf.extend_from_slice(&point.lon.to_le_bytes());
        buf.extend_from_slice(&point.lat.to_le_bytes());
    }

    buf
}

/// First coordinate of a standard WKB or EWKB geometry, either byte order.
///
/// Points return themselves; lines, polygons, multi-geometries and
/// collections return their first vertex. `None` for truncated input, empty
/// geometries or unknown type codes.
pub fn read_first_point(wkb: &[u8]) -> Option<Point> {
    read_geometry(wkb, 0, 0)
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            0 => Some(ByteOrder::Big),
            1 => Some(ByteOrder::Little),
            _ => None,
        }
    }

    fn u32_at(self, buf: &[u8], offset: usize) -> Option<u32> {
        let raw: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Big => u32::from_be_bytes(raw),
            ByteOrder::Little => u32::from_le_bytes(raw),
        })
    }

    fn f64_at(self, buf: &[u8], offset: usize) -> Option<f64> {
        let raw: [u8; 8] = buf.get(offset..offset + 8)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Big => f64::from_be_bytes(raw),
            ByteOrder::Little => f64::from_le_bytes(raw),
        })
    }

    fn point_at(self, buf: &[u8], offset: usize) -> Option<Point> {
        Some(Point::new(
            self.f64_at(buf, offset)?,
            self.f64_at(buf, offset + 8)?,
        ))
    }
}

fn read_geometry(wkb: &[u8], offset: usize, depth: usize) -> Option<Point> {
    if depth > MAX_NESTING {
        return None;
    }

    let order = ByteOrder::from_marker(*wkb.get(offset)?)?;
    let raw_type = order.u32_at(wkb, offset + 1)?;
    let mut pos = offset + 5;
    if raw_type & EWKB_SRID_FLAG != 0 {
        pos += 4;
    }

    // ISO WKB encodes Z/M as +1000/+2000/+3000 on the base code
    match (raw_type & GEOMETRY_TYPE_MASK) % 1000 {
        1 => order.point_at(wkb, pos),
        2 => {
            if order.u32_at(wkb, pos)? == 0 {
                return None;
            }
            order.point_at(wkb, pos + 4)
        }
        3 => {
            let n_rings = order.u32_at(wkb, pos)?;
            if n_rings == 0 || order.u32_at(wkb, pos + 4)? == 0 {
                return None;
            }
            order.point_at(wkb, pos + 8)
        }
        4..=7 => {
            if order.u32_at(wkb, pos)? == 0 {
                return None;
            }
            read_geometry(wkb, pos + 4, depth + 1)
        }
        _ => None,
    }
}
