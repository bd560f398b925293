//! Routing engine capability interface
//!
//! The engine is opaque: everything this crate knows about it is the call
//! surface below. An [`EngineLoader`] turns a configuration path into a
//! [`Router`] handle; the handle answers route, matrix, locate and raw JSON
//! requests. Handles are non-reentrant and are only ever reached through
//! [`crate::session::RouterSession`].
//!
//! Implementations:
//! - [`mock::MockEngine`]: scriptable, call-recording engine for tests
//! - [`straight_line::StraightLineEngine`]: deterministic great-circle engine
//! - `valhalla::ValhallaEngine`: native engine via FFI (feature `valhalla`)

pub mod mock;
pub mod straight_line;
#[cfg(feature = "valhalla")]
pub mod valhalla;

use std::path::Path;

use travel_time_common::{Error, Result};

use crate::geometry::Point;

/// Creates router handles from a configuration path
pub trait EngineLoader: Send + Sync {
    type Router: Router;

    /// Construct a new handle. Failure must not leave any engine state behind.
    fn load(&self, config_path: &Path) -> Result<Self::Router>;
}

/// A loaded routing engine handle.
///
/// Every call takes `&mut self`: the underlying engine is not reentrant.
/// `max_points` bounds the number of geometry points the engine may return;
/// how it truncates beyond that is its own business.
pub trait Router: Send {
    fn is_ready(&self) -> bool;

    fn route(
        &mut self,
        from: Point,
        to: Point,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary>;

    /// Route between two WKT geometries
    fn route_text(
        &mut self,
        from: &str,
        to: &str,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary>;

    /// Route between two standard WKB geometries
    fn route_binary(
        &mut self,
        from: &[u8],
        to: &[u8],
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary>;

    /// Fill `out` with up to `sources.len() * destinations.len()` entries and
    /// return how many were written. Pairs the engine cannot answer may be
    /// omitted.
    fn matrix(
        &mut self,
        sources: &CoordinateColumns,
        destinations: &CoordinateColumns,
        profile: &str,
        out: &mut [MatrixEntry],
    ) -> Result<usize>;

    /// Snap a coordinate to the nearest routable location
    fn locate(&mut self, at: Point, profile: &str) -> Result<Point>;

    /// Forward a raw JSON request for `action` and return the raw response
    fn raw_request(&mut self, action: &str, request_json: &str) -> Result<String>;
}

/// Result of a single route call
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Ordered route shape, (lon, lat)
    pub points: Vec<Point>,
}

/// One cell of a travel-time matrix.
///
/// Layout matches the native engine's matrix entry so provisioned storage
/// can be handed across FFI without copying.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatrixEntry {
    pub from_index: i32,
    pub to_index: i32,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Parallel latitude/longitude columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateColumns {
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl CoordinateColumns {
    /// Pair up two columns; `what` names them in the error message
    pub fn new(lats: Vec<f64>, lons: Vec<f64>, what: &str) -> Result<Self> {
        if lats.len() != lons.len() {
            return Err(Error::InvalidInput(format!(
                "{what} latitude and longitude arrays must have the same length ({} vs {})",
                lats.len(),
                lons.len()
            )));
        }
        Ok(Self { lats, lons })
    }

    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn point(&self, index: usize) -> Option<Point> {
        Some(Point::new(*self.lons.get(index)?, *self.lats.get(index)?))
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.lons
            .iter()
            .zip(&self.lats)
            .map(|(&lon, &lat)| Point::new(lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_require_equal_lengths() {
        let err = CoordinateColumns::new(vec![1.0, 2.0], vec![3.0], "Source").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("Source"));
    }

    #[test]
    fn test_columns_points_are_lon_lat() {
        let cols = CoordinateColumns::new(vec![50.85, 48.85], vec![4.35, 2.35], "Source").unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.point(1), Some(Point::new(2.35, 48.85)));
        assert_eq!(cols.point(2), None);
        assert_eq!(cols.points().next(), Some(Point::new(4.35, 50.85)));
    }

    #[test]
    fn test_matrix_entry_layout() {
        // int, int, double, double
        assert_eq!(std::mem::size_of::<MatrixEntry>(), 24);
        assert_eq!(std::mem::align_of::<MatrixEntry>(), 8);
    }
}
