//! Route request dispatch
//!
//! Picks the engine call for a pair of normalized geometries and runs it
//! under the session lock.

use tracing::debug;
use travel_time_common::{Error, Result};

use crate::engine::{EngineLoader, RouteSummary, Router};
use crate::geometry::{Encoding, GeometryValue, Point};
use crate::session::RouterSession;

/// Engine call used for a geometry pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPath {
    Text,
    Binary,
}

impl RequestPath {
    /// Both binary: binary path. Anything else decodable goes as text, a
    /// binary side included, without re-encoding.
    pub fn select(from: Encoding, to: Encoding) -> Result<Self> {
        match (from, to) {
            (Encoding::Unrecoverable, _) => Err(unrecognized("from")),
            (_, Encoding::Unrecoverable) => Err(unrecognized("to")),
            (Encoding::StandardBinary, Encoding::StandardBinary) => Ok(RequestPath::Binary),
            _ => Ok(RequestPath::Text),
        }
    }
}

fn unrecognized(side: &str) -> Error {
    Error::GeometryDecode(format!(
        "Unrecognized geometry format in '{side}' argument"
    ))
}

/// Point buffer capacities handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointCapacity {
    /// Raw-coordinate entry point
    pub coordinates: usize,
    /// Geometry entry points
    pub geometry: usize,
}

impl Default for PointCapacity {
    fn default() -> Self {
        Self {
            coordinates: 10_000,
            geometry: 50_000,
        }
    }
}

pub struct RouteDispatcher<'s, L: EngineLoader> {
    session: &'s RouterSession<L>,
    capacity: PointCapacity,
}

impl<'s, L: EngineLoader> RouteDispatcher<'s, L> {
    pub fn new(session: &'s RouterSession<L>, capacity: PointCapacity) -> Self {
        Self { session, capacity }
    }

    /// Route between two geometries of any supported encoding
    pub fn route(
        &self,
        from: &GeometryValue,
        to: &GeometryValue,
        profile: &str,
    ) -> Result<RouteSummary> {
        let max_points = self.capacity.geometry;
        self.session.with_router(|router| {
            let path = RequestPath::select(from.encoding(), to.encoding())?;
            debug!(?path, from_len = from.len(), to_len = to.len(), profile, "Dispatching route");
            match path {
                RequestPath::Binary => {
                    router.route_binary(from.bytes(), to.bytes(), profile, max_points)
                }
                RequestPath::Text => {
                    router.route_text(&from.as_text(), &to.as_text(), profile, max_points)
                }
            }
        })
    }

    /// Route between two raw coordinates
    pub fn route_coordinates(&self, from: Point, to: Point, profile: &str) -> Result<RouteSummary> {
        let max_points = self.capacity.coordinates;
        self.session
            .with_router(|router| router.route(from, to, profile, max_points))
    }

    pub fn locate(&self, at: Point, profile: &str) -> Result<Point> {
        self.session.with_router(|router| router.locate(at, profile))
    }

    pub fn raw_request(&self, action: &str, request_json: &str) -> Result<String> {
        self.session
            .with_router(|router| router.raw_request(action, request_json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockCall, MockEngine};
    use crate::geometry::GeometryPayload;

    fn loaded() -> (MockEngine, RouterSession<MockEngine>) {
        let engine = MockEngine::new();
        let session = RouterSession::new(engine.clone());
        session.load("a.json").unwrap();
        engine.clear_calls();
        (engine, session)
    }

    #[test]
    fn test_path_selection() {
        use Encoding::*;
        assert_eq!(RequestPath::select(StandardBinary, StandardBinary).unwrap(), RequestPath::Binary);
        assert_eq!(RequestPath::select(Text, Text).unwrap(), RequestPath::Text);
        assert_eq!(RequestPath::select(Text, StandardBinary).unwrap(), RequestPath::Text);
        assert_eq!(RequestPath::select(StandardBinary, Text).unwrap(), RequestPath::Text);
        assert!(matches!(
            RequestPath::select(Unrecoverable, Text).unwrap_err(),
            Error::GeometryDecode(_)
        ));
        assert!(matches!(
            RequestPath::select(StandardBinary, Unrecoverable).unwrap_err(),
            Error::GeometryDecode(_)
        ));
    }

    #[test]
    fn test_binary_reaches_engine_unchanged() {
        let (engine, session) = loaded();
        let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());

        let mut wkb = vec![1u8];
        wkb.extend_from_slice(&1u32.to_le_bytes());
        wkb.extend_from_slice(&4.35f64.to_le_bytes());
        wkb.extend_from_slice(&50.85f64.to_le_bytes());

        let from = GeometryValue::from_payload(GeometryPayload::Binary(&wkb), 6);
        let to = GeometryValue::from_payload(GeometryPayload::Wkb(&wkb), 6);
        dispatcher.route(&from, &to, "auto").unwrap();

        assert_eq!(
            engine.calls(),
            vec![MockCall::RouteBinary {
                handle: 1,
                from: wkb.clone(),
                to: wkb,
                max_points: 50_000,
            }]
        );
    }

    #[test]
    fn test_mixed_pair_goes_as_text() {
        let (engine, session) = loaded();
        let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());

        let from = GeometryValue::text("POINT(1 2)");
        let to = GeometryValue::standard_binary(b"\x01\x01\x00\x00\x00");
        dispatcher.route(&from, &to, "auto").unwrap();

        match engine.calls().as_slice() {
            [MockCall::RouteText { from, to, .. }] => {
                assert_eq!(from, "POINT(1 2)");
                assert_eq!(to.len(), 5);
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[test]
    fn test_unrecoverable_never_reaches_engine() {
        let (engine, session) = loaded();
        let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());

        let garbage = GeometryValue::from_payload(GeometryPayload::Binary(&[0xFF; 40]), 6);
        let ok = GeometryValue::text("POINT(1 2)");
        let err = dispatcher.route(&ok, &garbage, "auto").unwrap_err();

        assert!(err.is_row_scoped());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_not_loaded_wins_over_decode_failure() {
        let session = RouterSession::new(MockEngine::new());
        let dispatcher = RouteDispatcher::new(&session, PointCapacity::default());
        let garbage = GeometryValue::from_payload(GeometryPayload::Binary(&[0xFF; 40]), 6);

        let err = dispatcher.route(&garbage, &garbage, "auto").unwrap_err();
        assert!(matches!(err, Error::EngineNotLoaded));
    }

    #[test]
    fn test_coordinate_capacity() {
        let (engine, session) = loaded();
        let capacity = PointCapacity {
            coordinates: 7,
            geometry: 9,
        };
        let dispatcher = RouteDispatcher::new(&session, capacity);
        dispatcher
            .route_coordinates(Point::new(4.35, 50.85), Point::new(4.40, 51.22), "bicycle")
            .unwrap();

        assert!(matches!(
            engine.calls().as_slice(),
            [MockCall::Route { max_points: 7, .. }]
        ));
    }
}
