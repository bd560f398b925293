//! Great-circle reference engine
//!
//! Answers every request deterministically from the haversine distance
//! between the two endpoints, stretched by a detour factor, at a fixed
//! speed per costing profile. Useful for smoke tests and demos where no
//! routing tiles are available.
//!
//! ## Config file (JSON)
//!
//! ```json
//! {
//!   "detour_factor": 1.3,
//!   "sample_spacing_m": 250.0,
//!   "snap_precision": 5,
//!   "profiles": { "auto": { "speed_kmh": 50.0 } }
//! }
//! ```
//!
//! Every field is optional; missing profiles fall back to the built-in
//! speed table.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use geo::{HaversineDistance, HaversineIntermediate};
use serde::Deserialize;
use serde_json::{json, Value};
use travel_time_common::{Error, Result};

use super::{CoordinateColumns, EngineLoader, MatrixEntry, Router, RouteSummary};
use crate::geometry::{wkb, wkt, Point};

/// Built-in profile speeds (km/h)
const DEFAULT_SPEEDS: [(&str, f64); 4] = [
    ("auto", 50.0),
    ("bicycle", 18.0),
    ("pedestrian", 5.0),
    ("truck", 40.0),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StraightLineConfig {
    /// Multiplier from great-circle to reported road distance
    pub detour_factor: f64,
    /// Spacing between densified route points (meters)
    pub sample_spacing_m: f64,
    /// Decimals kept when snapping in `locate`
    pub snap_precision: u32,
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub speed_kmh: f64,
}

impl Default for StraightLineConfig {
    fn default() -> Self {
        Self {
            detour_factor: 1.3,
            sample_spacing_m: 250.0,
            snap_precision: 5,
            profiles: DEFAULT_SPEEDS
                .iter()
                .map(|&(name, speed_kmh)| (name.to_string(), ProfileConfig { speed_kmh }))
                .collect(),
        }
    }
}

impl StraightLineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("Invalid engine config: {e}")))?;

        // Explicit profiles extend the built-in table rather than replace it
        for (name, speed_kmh) in DEFAULT_SPEEDS {
            config
                .profiles
                .entry(name.to_string())
                .or_insert(ProfileConfig { speed_kmh });
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.detour_factor >= 1.0 && self.detour_factor.is_finite()) {
            return Err(Error::Configuration(format!(
                "detour_factor must be >= 1.0, got {}",
                self.detour_factor
            )));
        }
        if !(self.sample_spacing_m > 0.0 && self.sample_spacing_m.is_finite()) {
            return Err(Error::Configuration(format!(
                "sample_spacing_m must be positive, got {}",
                self.sample_spacing_m
            )));
        }
        if self.snap_precision > 15 {
            return Err(Error::Configuration(format!(
                "snap_precision must be <= 15, got {}",
                self.snap_precision
            )));
        }
        for (name, profile) in &self.profiles {
            if !(profile.speed_kmh > 0.0 && profile.speed_kmh.is_finite()) {
                return Err(Error::Configuration(format!(
                    "profile '{name}' speed_kmh must be positive, got {}",
                    profile.speed_kmh
                )));
            }
        }
        Ok(())
    }
}

/// Loader for [`StraightLineRouter`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineEngine;

impl EngineLoader for StraightLineEngine {
    type Router = StraightLineRouter;

    fn load(&self, config_path: &Path) -> Result<StraightLineRouter> {
        let text = fs::read_to_string(config_path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config {}: {e}",
                config_path.display()
            ))
        })?;
        let config = StraightLineConfig::from_json(&text)?;

        tracing::debug!(
            path = %config_path.display(),
            profiles = config.profiles.len(),
            detour_factor = config.detour_factor,
            "Straight-line engine configured"
        );

        Ok(StraightLineRouter { config })
    }
}

#[derive(Debug, Clone)]
pub struct StraightLineRouter {
    config: StraightLineConfig,
}

impl StraightLineRouter {
    pub fn new(config: StraightLineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StraightLineConfig {
        &self.config
    }

    fn speed_mps(&self, profile: &str) -> Result<f64> {
        self.config
            .profiles
            .get(profile)
            .map(|p| p.speed_kmh / 3.6)
            .ok_or_else(|| Error::EngineRequest(format!("Unknown costing profile '{profile}'")))
    }

    /// Road distance and duration between two valid points
    fn leg(&self, from: Point, to: Point, speed_mps: f64) -> (f64, f64) {
        let distance_m = great_circle_m(from, to) * self.config.detour_factor;
        (distance_m, distance_m / speed_mps)
    }

    /// Points along the great circle, at most `sample_spacing_m` apart
    fn shape(&self, from: Point, to: Point, max_points: usize) -> Vec<Point> {
        let a = geo::Point::new(from.lon, from.lat);
        let b = geo::Point::new(to.lon, to.lat);
        let length_m = a.haversine_distance(&b);
        // Interpolating along a zero-length arc yields NaN
        if length_m == 0.0 {
            return std::iter::once(from).take(max_points).collect();
        }
        let segments = (length_m / self.config.sample_spacing_m)
            .ceil()
            .max(1.0) as usize;

        (0..=segments)
            .take(max_points)
            .map(|step| {
                let p = a.haversine_intermediate(&b, step as f64 / segments as f64);
                Point::new(p.x(), p.y())
            })
            .collect()
    }

    fn snap(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.config.snap_precision as i32);
        (value * scale).round() / scale
    }
}

fn great_circle_m(from: Point, to: Point) -> f64 {
    geo::Point::new(from.lon, from.lat).haversine_distance(&geo::Point::new(to.lon, to.lat))
}

fn checked(point: Point) -> Result<Point> {
    if point.in_range() {
        Ok(point)
    } else {
        Err(Error::EngineRequest(format!(
            "Coordinate out of range: lat {}, lon {}",
            point.lat, point.lon
        )))
    }
}

impl Router for StraightLineRouter {
    fn is_ready(&self) -> bool {
        true
    }

    fn route(
        &mut self,
        from: Point,
        to: Point,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        let speed = self.speed_mps(profile)?;
        let (from, to) = (checked(from)?, checked(to)?);
        let (distance_m, duration_s) = self.leg(from, to, speed);

        Ok(RouteSummary {
            distance_m,
            duration_s,
            points: self.shape(from, to, max_points),
        })
    }

    fn route_text(
        &mut self,
        from: &str,
        to: &str,
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        let parse = |text: &str| {
            wkt::first_coordinate(text).ok_or_else(|| {
                Error::EngineRequest(format!("Failed to parse WKT geometry: {text}"))
            })
        };
        let (from, to) = (parse(from)?, parse(to)?);
        self.route(from, to, profile, max_points)
    }

    fn route_binary(
        &mut self,
        from: &[u8],
        to: &[u8],
        profile: &str,
        max_points: usize,
    ) -> Result<RouteSummary> {
        let parse = |bytes: &[u8]| {
            wkb::read_first_point(bytes).ok_or_else(|| {
                Error::EngineRequest(format!(
                    "Failed to parse WKB geometry ({} bytes)",
                    bytes.len()
                ))
            })
        };
        let (from, to) = (parse(from)?, parse(to)?);
        self.route(from, to, profile, max_points)
    }

    fn matrix(
        &mut self,
        sources: &CoordinateColumns,
        destinations: &CoordinateColumns,
        profile: &str,
        out: &mut [MatrixEntry],
    ) -> Result<usize> {
        let speed = self.speed_mps(profile)?;
        let mut written = 0;

        for (i, from) in sources.points().enumerate() {
            if !from.in_range() {
                continue;
            }
            for (j, to) in destinations.points().enumerate() {
                if !to.in_range() {
                    continue;
                }
                let slot = out.get_mut(written).ok_or_else(|| {
                    Error::EngineRequest("Matrix output buffer too small".to_string())
                })?;
                let (distance_m, duration_s) = self.leg(from, to, speed);
                *slot = MatrixEntry {
                    from_index: i as i32,
                    to_index: j as i32,
                    distance_m,
                    duration_s,
                };
                written += 1;
            }
        }

        Ok(written)
    }

    fn locate(&mut self, at: Point, profile: &str) -> Result<Point> {
        self.speed_mps(profile)?;
        let at = checked(at)?;
        Ok(Point::new(self.snap(at.lon), self.snap(at.lat)))
    }

    fn raw_request(&mut self, action: &str, request_json: &str) -> Result<String> {
        let request: Value = serde_json::from_str(request_json)
            .map_err(|e| Error::EngineRequest(format!("Failed to parse request JSON: {e}")))?;

        let response = match action {
            "status" => json!({
                "engine": "straight-line",
                "version": env!("CARGO_PKG_VERSION"),
                "profiles": self.config.profiles.keys().collect::<Vec<_>>(),
            }),
            "route" => {
                let req: LocationsRequest = parse_request(request)?;
                let [from, to] = req.endpoints()?;
                let summary = self.route(from, to, &req.costing, 0)?;
                json!({
                    "trip": {
                        "summary": {
                            "length": summary.distance_m / 1000.0,
                            "time": summary.duration_s,
                        },
                        "units": "kilometers",
                    }
                })
            }
            "locate" => {
                let req: LocationsRequest = parse_request(request)?;
                let snapped = req
                    .locations
                    .iter()
                    .map(|loc| self.locate(Point::new(loc.lon, loc.lat), &req.costing))
                    .collect::<Result<Vec<_>>>()?;
                Value::Array(
                    snapped
                        .into_iter()
                        .map(|p| json!({ "lat": p.lat, "lon": p.lon }))
                        .collect(),
                )
            }
            other => {
                return Err(Error::EngineRequest(format!(
                    "Unsupported action '{other}'"
                )))
            }
        };

        Ok(response.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct LocationsRequest {
    locations: Vec<Location>,
    #[serde(default = "default_costing")]
    costing: String,
}

fn default_costing() -> String {
    "auto".to_string()
}

impl LocationsRequest {
    fn endpoints(&self) -> Result<[Point; 2]> {
        match self.locations.as_slice() {
            [from, to] => Ok([
                Point::new(from.lon, from.lat),
                Point::new(to.lon, to.lat),
            ]),
            other => Err(Error::EngineRequest(format!(
                "Route requires exactly 2 locations, got {}",
                other.len()
            ))),
        }
    }
}

fn parse_request<T: serde::de::DeserializeOwned>(request: Value) -> Result<T> {
    serde_json::from_value(request)
        .map_err(|e| Error::EngineRequest(format!("Invalid request: {e}")))
}
