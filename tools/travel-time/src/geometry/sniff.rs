//! Heuristic format sniffing for untyped geometry blobs
//!
//! No tag on the payload is reliable, so the layout is guessed from byte
//! patterns. Two binary layouts are recognized:
//!
//! ## StandardBinary (WKB / EWKB)
//!
//! ```text
//! byte 0:    byte order (0 = big-endian, 1 = little-endian)
//! bytes 1-4: geometry type (u32, in that byte order; high bits = EWKB flags)
//! bytes 5..: geometry body
//! ```
//!
//! ## EmbeddedBinary (host-internal geometry, 32 bytes for a point)
//!
//! ```text
//! bytes 0-11:  header/padding (small values, all zero for a plain point)
//! bytes 12-15: geometry type (u32 little-endian, 1 = POINT)
//! bytes 16-23: x (f64 little-endian, longitude)
//! bytes 24-31: y (f64 little-endian, latitude)
//! ```
//!
//! Decoding is an ordered chain of pure attempts; the first one that answers
//! wins:
//!
//! 1. `wkt-text`: the blob is WKT text
//! 2. `standard-binary`: the blob is WKB, passed through untouched
//! 3. `embedded-point`: an EmbeddedBinary POINT with in-range coordinates
//! 4. `coordinate-scan`: first 8-byte-aligned (x, y) pair in range
//!
//! Nothing answering means the blob is unrecoverable.

use super::Point;

/// Smallest standard WKB geometry (a POINT: 1 + 4 + 16)
pub const MIN_STANDARD_LEN: usize = 21;

/// Smallest embedded geometry (a POINT: 12 + 4 + 16)
pub const MIN_EMBEDDED_LEN: usize = 32;

/// Offset of the type code in the embedded layout
const EMBEDDED_TYPE_OFFSET: usize = 12;

/// Offset of the point coordinates in the embedded layout
const EMBEDDED_COORD_OFFSET: usize = 16;

/// Largest byte value tolerated in the embedded header
const EMBEDDED_HEADER_MAX: u8 = 16;

/// First offset tried by the coordinate scan
const SCAN_START: usize = 8;

/// EWKB flag bits (Z, M, SRID) live above this mask
const GEOMETRY_TYPE_MASK: u32 = 0x0FFF_FFFF;

const GEOMETRY_POINT: u32 = 1;

const WKT_KEYWORDS: [&str; 8] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
    "SRID=",
];

/// Layout detected for a raw payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Text,
    StandardBinary,
    EmbeddedBinary,
    Unrecoverable,
}

/// Outcome of the decoder chain for a binary payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    /// Blob holds WKT text; pass through as text
    Text,
    /// Blob is standard WKB; pass through as binary
    StandardBinary,
    /// A point recovered from a non-standard layout
    Point(Point),
    Unrecoverable,
}

type Attempt = fn(&[u8]) -> Option<Decoded>;

/// Decoder attempts in priority order
const DECODE_CHAIN: [(&str, Attempt); 4] = [
    ("wkt-text", attempt_wkt_text),
    ("standard-binary", attempt_standard_binary),
    ("embedded-point", attempt_embedded_point),
    ("coordinate-scan", attempt_coordinate_scan),
];

/// Classify a payload's layout without extracting anything.
pub fn classify(bytes: &[u8]) -> PayloadFormat {
    if looks_like_wkt(bytes) {
        PayloadFormat::Text
    } else if looks_like_standard_binary(bytes) {
        PayloadFormat::StandardBinary
    } else if looks_like_embedded_binary(bytes) {
        PayloadFormat::EmbeddedBinary
    } else {
        PayloadFormat::Unrecoverable
    }
}

/// Run the decoder chain over a binary payload.
pub fn decode(bytes: &[u8]) -> Decoded {
    for (name, attempt) in DECODE_CHAIN {
        if let Some(decoded) = attempt(bytes) {
            tracing::trace!(decoder = name, len = bytes.len(), "geometry payload decoded");
            return decoded;
        }
    }
    tracing::trace!(len = bytes.len(), "geometry payload unrecoverable");
    Decoded::Unrecoverable
}

/// UTF-8 text starting with a WKT or EWKT keyword
pub fn looks_like_wkt(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    let head = text.trim_start().as_bytes();
    WKT_KEYWORDS.iter().any(|keyword| {
        head.len() >= keyword.len() && head[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
    })
}

/// Standard WKB check: byte-order marker, type code in [1, 7] once EWKB flags
/// are masked off, and not the all-zero header of the embedded layout.
pub fn looks_like_standard_binary(bytes: &[u8]) -> bool {
    if bytes.len() < MIN_STANDARD_LEN {
        return false;
    }

    let type_bytes = [bytes[1], bytes[2], bytes[3], bytes[4]];
    let geom_type = match bytes[0] {
        0x00 => u32::from_be_bytes(type_bytes),
        0x01 => u32::from_le_bytes(type_bytes),
        _ => return false,
    };

    if !(1..=7).contains(&(geom_type & GEOMETRY_TYPE_MASK)) {
        return false;
    }

    // Zeroed bytes 1..11 is the embedded signature, not real WKB
    let zero_header = bytes[1..12].iter().all(|&b| b == 0);
    !(zero_header && bytes.len() >= MIN_EMBEDDED_LEN)
}

/// Embedded layout check: small header bytes and a type code in [1, 7]
pub fn looks_like_embedded_binary(bytes: &[u8]) -> bool {
    if bytes.len() < MIN_EMBEDDED_LEN {
        return false;
    }
    if bytes[..EMBEDDED_TYPE_OFFSET]
        .iter()
        .any(|&b| b > EMBEDDED_HEADER_MAX)
    {
        return false;
    }
    (1..=7).contains(&embedded_type(bytes))
}

/// Read an in-range point from an embedded POINT. `None` for other types or
/// out-of-range coordinates.
pub fn embedded_point(bytes: &[u8]) -> Option<Point> {
    if bytes.len() < MIN_EMBEDDED_LEN || embedded_type(bytes) != GEOMETRY_POINT {
        return None;
    }
    let point = Point::new(
        read_f64_le(bytes, EMBEDDED_COORD_OFFSET)?,
        read_f64_le(bytes, EMBEDDED_COORD_OFFSET + 8)?,
    );
    point.in_range().then_some(point)
}

/// Slide an 8-byte-aligned window from offset 8 and return the first (x, y)
/// pair that looks like (lon, lat). Lowest offset wins.
pub fn scan_coordinates(bytes: &[u8]) -> Option<Point> {
    (SCAN_START..)
        .step_by(8)
        .take_while(|offset| offset + 16 <= bytes.len())
        .find_map(|offset| {
            let point = Point::new(read_f64_le(bytes, offset)?, read_f64_le(bytes, offset + 8)?);
            point.in_range().then_some(point)
        })
}

fn attempt_wkt_text(bytes: &[u8]) -> Option<Decoded> {
    looks_like_wkt(bytes).then_some(Decoded::Text)
}

fn attempt_standard_binary(bytes: &[u8]) -> Option<Decoded> {
    looks_like_standard_binary(bytes).then_some(Decoded::StandardBinary)
}

fn attempt_embedded_point(bytes: &[u8]) -> Option<Decoded> {
    if !looks_like_embedded_binary(bytes) {
        return None;
    }
    embedded_point(bytes).map(Decoded::Point)
}

fn attempt_coordinate_scan(bytes: &[u8]) -> Option<Decoded> {
    scan_coordinates(bytes).map(Decoded::Point)
}

fn embedded_type(bytes: &[u8]) -> u32 {
    let o = EMBEDDED_TYPE_OFFSET;
    u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
}

fn read_f64_le(bytes: &[u8], offset: usize) -> Option<f64> {
    let raw: [u8; 8] = bytes.get(offset..offset + 8)?.try_into().ok()?;
    Some(f64::from_le_bytes(raw))
}
