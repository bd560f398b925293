//! Per-row geometry ingestion
//!
//! Host columns arrive as text (WKT), as blobs of unknown layout, or as blobs
//! explicitly typed as standard WKB. Everything is normalized into a
//! [`GeometryValue`] tagged with exactly one [`Encoding`]:
//!
//! ```text
//! Text(&str)     ──────────────────────────────► Text
//! Wkb(&[u8])     ──────────────────────────────► StandardBinary
//! Binary(&[u8])  ── sniff::decode ─┬─ wkt-text ─► Text
//!                                  ├─ standard ─► StandardBinary
//!                                  ├─ point ────► Text (synthesized POINT)
//!                                  └─ none ─────► Unrecoverable
//! ```

pub mod sniff;
pub mod wkb;
pub mod wkt;

use std::borrow::Cow;

use serde::Serialize;

pub use sniff::{classify, decode, Decoded, PayloadFormat};

/// A point in WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Longitude in [-180, 180] and latitude in [-90, 90]. NaN never passes.
    pub fn in_range(&self) -> bool {
        (-180.0..=180.0).contains(&self.lon) && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Raw geometry payload for one row, keyed by the host column's physical type
#[derive(Debug, Clone, Copy)]
pub enum GeometryPayload<'a> {
    /// VARCHAR column, interpreted as WKT downstream
    Text(&'a str),
    /// BLOB or geometry-extension column of unknown binary layout
    Binary(&'a [u8]),
    /// Column explicitly typed as standard WKB
    Wkb(&'a [u8]),
}

/// Encoding tag carried by a normalized geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Text,
    StandardBinary,
    Unrecoverable,
}

/// A normalized per-row geometry, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryValue {
    bytes: Vec<u8>,
    encoding: Encoding,
    synthesized: bool,
}

impl GeometryValue {
    /// Normalize a payload. Recovered points are written as `POINT(lon lat)`
    /// with `wkt_precision` decimals.
    pub fn from_payload(payload: GeometryPayload<'_>, wkt_precision: usize) -> Self {
        match payload {
            GeometryPayload::Text(text) => Self::text(text),
            GeometryPayload::Wkb(bytes) => Self::standard_binary(bytes),
            GeometryPayload::Binary(bytes) => match sniff::decode(bytes) {
                Decoded::Text => Self {
                    bytes: bytes.to_vec(),
                    encoding: Encoding::Text,
                    synthesized: false,
                },
                Decoded::StandardBinary => Self::standard_binary(bytes),
                Decoded::Point(point) => Self {
                    bytes: wkt::point_text(point, wkt_precision).into_bytes(),
                    encoding: Encoding::Text,
                    synthesized: true,
                },
                Decoded::Unrecoverable => Self {
                    bytes: bytes.to_vec(),
                    encoding: Encoding::Unrecoverable,
                    synthesized: false,
                },
            },
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            bytes: text.as_bytes().to_vec(),
            encoding: Encoding::Text,
            synthesized: false,
        }
    }

    pub fn standard_binary(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            encoding: Encoding::StandardBinary,
            synthesized: false,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when the text was synthesized from an unlabeled binary layout
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// The synthesized WKT, if this value was recovered from a binary blob
    pub fn synthesized_wkt(&self) -> Option<&str> {
        if self.synthesized {
            std::str::from_utf8(&self.bytes).ok()
        } else {
            None
        }
    }

    /// Payload as text. Non-UTF-8 bytes (a binary value forced onto the text
    /// path) are replaced lossily and left for the engine to reject.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}
