//! Column-oriented function surface
//!
//! [`TravelTime`] is the service context a host query engine holds: it owns
//! the router session and the settings, and exposes one method per host
//! function. Arguments arrive as columns of nullable values; results come
//! back as a column of the same length.

use std::path::Path;

use serde::Serialize;
use tracing::info;
use travel_time_common::{Error, Result};

use crate::batch::{common_len, evaluate_rows};
use crate::dispatch::RouteDispatcher;
use crate::engine::EngineLoader;
use crate::geometry::{wkb, GeometryPayload, GeometryValue, Point};
use crate::matrix::{MatrixRequest, MatrixStream};
use crate::session::{LoadOutcome, RouterSession};
use crate::settings::Settings;

/// Output row of `route`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRow {
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// WKB LineString; `None` when the engine returned no points
    #[serde(serialize_with = "serialize_hex")]
    pub geometry: Option<Vec<u8>>,
}

fn serialize_hex<S: serde::Serializer>(
    geometry: &Option<Vec<u8>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match geometry {
        Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
        None => serializer.serialize_none(),
    }
}

pub struct TravelTime<L: EngineLoader> {
    session: RouterSession<L>,
    settings: Settings,
}

impl<L: EngineLoader> TravelTime<L> {
    pub fn new(loader: L, settings: Settings) -> Self {
        let session = RouterSession::with_policy(loader, settings.engine.reload_policy);
        Self { session, settings }
    }

    /// Build the context and load `engine.config_path` if one is configured
    pub fn start(loader: L, settings: Settings) -> Result<Self> {
        let context = Self::new(loader, settings);
        if let Some(path) = context.settings.engine.config_path.clone() {
            context.load(&path)?;
        }
        Ok(context)
    }

    pub fn session(&self) -> &RouterSession<L> {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn dispatcher(&self) -> RouteDispatcher<'_, L> {
        RouteDispatcher::new(&self.session, self.settings.limits.point_capacity())
    }

    /// Load one config. Engine failures abort, never null a row.
    pub fn load(&self, path: &Path) -> Result<LoadOutcome> {
        let outcome = self.session.load(path).map_err(|err| match err {
            Error::EngineRequest(msg) | Error::GeometryDecode(msg) => Error::Configuration(msg),
            other => other,
        })?;
        info!(path = %path.display(), ?outcome, "load_config");
        Ok(outcome)
    }

    /// `travel_time_load_config(path)`: true per non-null row
    pub fn load_config(&self, paths: &[Option<&str>]) -> Result<Vec<Option<bool>>> {
        evaluate_rows(paths.iter().copied(), |path| {
            self.load(Path::new(path)).map(|_| true)
        })
    }

    /// `travel_time_is_loaded()`
    pub fn is_loaded(&self, rows: usize) -> Vec<bool> {
        vec![self.session.is_ready(); rows]
    }

    /// `travel_time(lat1, lon1, lat2, lon2, costing)`: duration in seconds
    pub fn travel_time(
        &self,
        lat1: &[Option<f64>],
        lon1: &[Option<f64>],
        lat2: &[Option<f64>],
        lon2: &[Option<f64>],
        profile: &[Option<&str>],
    ) -> Result<Vec<Option<f64>>> {
        let rows = common_len(&[
            ("lat1", lat1.len()),
            ("lon1", lon1.len()),
            ("lat2", lat2.len()),
            ("lon2", lon2.len()),
            ("costing", profile.len()),
        ])?;
        let dispatcher = self.dispatcher();

        let inputs = (0..rows).map(|i| {
            Some((
                Point::new(lon1[i]?, lat1[i]?),
                Point::new(lon2[i]?, lat2[i]?),
                profile[i]?,
            ))
        });
        evaluate_rows(inputs, |(from, to, profile)| {
            dispatcher
                .route_coordinates(from, to, profile)
                .map(|summary| summary.duration_s)
        })
    }

    /// `travel_time_route(from, to, costing)`
    pub fn route(
        &self,
        from: &[Option<GeometryPayload<'_>>],
        to: &[Option<GeometryPayload<'_>>],
        profile: &[Option<&str>],
    ) -> Result<Vec<Option<RouteRow>>> {
        let rows = common_len(&[
            ("from", from.len()),
            ("to", to.len()),
            ("costing", profile.len()),
        ])?;
        let dispatcher = self.dispatcher();
        let precision = self.settings.geometry.wkt_precision;

        let inputs = (0..rows).map(|i| Some((from[i]?, to[i]?, profile[i]?)));
        evaluate_rows(inputs, |(from, to, profile)| {
            let from = GeometryValue::from_payload(from, precision);
            let to = GeometryValue::from_payload(to, precision);
            let summary = dispatcher.route(&from, &to, profile)?;

            let geometry = wkb::encode_linestring(&summary.points);
            Ok(RouteRow {
                distance_km: summary.distance_m / 1000.0,
                duration_minutes: summary.duration_s / 60.0,
                geometry: (!geometry.is_empty()).then_some(geometry),
            })
        })
    }

    /// `travel_time_locate(lat, lon, costing)`: snapped coordinate
    pub fn locate(
        &self,
        lat: &[Option<f64>],
        lon: &[Option<f64>],
        profile: &[Option<&str>],
    ) -> Result<Vec<Option<Point>>> {
        let rows = common_len(&[
            ("lat", lat.len()),
            ("lon", lon.len()),
            ("costing", profile.len()),
        ])?;
        let dispatcher = self.dispatcher();

        let inputs = (0..rows).map(|i| Some((Point::new(lon[i]?, lat[i]?), profile[i]?)));
        evaluate_rows(inputs, |(at, profile)| dispatcher.locate(at, profile))
    }

    /// `travel_time_request(action, json)`: raw engine response
    ///
    /// Null arguments give a null row. Any engine error aborts the call,
    /// since a raw response has no per-row failure value.
    pub fn request(
        &self,
        action: &[Option<&str>],
        request_json: &[Option<&str>],
    ) -> Result<Vec<Option<String>>> {
        let rows = common_len(&[("action", action.len()), ("json", request_json.len())])?;
        let dispatcher = self.dispatcher();

        (0..rows)
            .map(|i| match (action[i], request_json[i]) {
                (Some(action), Some(json)) => dispatcher.raw_request(action, json).map(Some),
                _ => Ok(None),
            })
            .collect()
    }

    /// `travel_time_matrix(src_lats, src_lons, dst_lats, dst_lons, costing)`
    pub fn matrix(
        &self,
        src_lats: Vec<f64>,
        src_lons: Vec<f64>,
        dst_lats: Vec<f64>,
        dst_lons: Vec<f64>,
        profile: &str,
    ) -> Result<MatrixStream> {
        MatrixRequest::bind(src_lats, src_lons, dst_lats, dst_lons, profile)?
            .init(&self.session, self.settings.limits.matrix_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use std::path::PathBuf;

    fn context() -> (MockEngine, TravelTime<MockEngine>) {
        let engine = MockEngine::new();
        (engine.clone(), TravelTime::new(engine, Settings::default()))
    }

    #[test]
    fn test_route_row_units() {
        let (_, tt) = context();
        tt.load_config(&[Some("a.json")]).unwrap();

        let rows = tt
            .route(
                &[Some(GeometryPayload::Text("POINT(1 2)"))],
                &[Some(GeometryPayload::Text("POINT(3 4)"))],
                &[Some("auto")],
            )
            .unwrap();
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.distance_km, 1.0);
        assert_eq!(row.duration_minutes, 1.0);
        assert_eq!(row.geometry.as_ref().unwrap().len(), 9 + 2 * 16);
    }

    #[test]
    fn test_zero_points_gives_null_geometry() {
        let (engine, tt) = context();
        engine.route_points(Vec::new());
        tt.load_config(&[Some("a.json")]).unwrap();

        let rows = tt
            .route(
                &[Some(GeometryPayload::Text("POINT(1 2)"))],
                &[Some(GeometryPayload::Text("POINT(3 4)"))],
                &[Some("auto")],
            )
            .unwrap();
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.distance_km, 1.0);
        assert_eq!(row.geometry, None);
    }

    #[test]
    fn test_load_failure_aborts() {
        let (engine, tt) = context();
        engine.fail_path("bad.json");
        let err = tt.load_config(&[Some("bad.json")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(tt.is_loaded(2), vec![false, false]);
    }

    #[test]
    fn test_start_loads_configured_engine() {
        let engine = MockEngine::new();
        let mut settings = Settings::default();
        settings.engine.config_path = Some(PathBuf::from("startup.json"));

        let tt = TravelTime::start(engine.clone(), settings).unwrap();
        assert!(tt.session().is_ready());
        assert_eq!(engine.loads(), 1);
        assert_eq!(
            tt.settings().engine.config_path.as_deref(),
            Some(Path::new("startup.json"))
        );
    }

    #[test]
    fn test_route_row_serializes_hex() {
        let row = RouteRow {
            distance_km: 1.5,
            duration_minutes: 2.0,
            geometry: Some(vec![0x01, 0x02]),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["geometry"], "0102");
    }
}
