//! Service settings, loaded from TOML
//!
//! ```toml
//! [engine]
//! config_path = "valhalla.json"
//! reload_policy = "discard"
//!
//! [limits]
//! coordinate_route_points = 10000
//! geometry_route_points = 50000
//! matrix_batch_size = 2048
//!
//! [geometry]
//! wkt_precision = 6
//!
//! [logging]
//! filter = "info"
//! format = "pretty"
//! ```
//!
//! Every section and field is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use travel_time_common::{Error, Result};

use crate::dispatch::PointCapacity;
use crate::geometry::wkt::MAX_WKT_PRECISION;
use crate::matrix::DEFAULT_BATCH_SIZE;
use crate::session::ReloadPolicy;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub engine: EngineSettings,
    pub limits: Limits,
    pub geometry: GeometrySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Engine config loaded at startup, if any
    pub config_path: Option<PathBuf>,
    pub reload_policy: ReloadPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub coordinate_route_points: usize,
    pub geometry_route_points: usize,
    pub matrix_batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        let capacity = PointCapacity::default();
        Self {
            coordinate_route_points: capacity.coordinates,
            geometry_route_points: capacity.geometry,
            matrix_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Limits {
    pub fn point_capacity(&self) -> PointCapacity {
        PointCapacity {
            coordinates: self.coordinate_route_points,
            geometry: self.geometry_route_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometrySettings {
    /// Decimals in POINT text synthesized from binary blobs
    pub wkt_precision: usize,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self { wkt_precision: 6 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Read, parse and validate a settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (name, value) in [
            ("limits.coordinate_route_points", self.limits.coordinate_route_points),
            ("limits.geometry_route_points", self.limits.geometry_route_points),
            ("limits.matrix_batch_size", self.limits.matrix_batch_size),
        ] {
            if value == 0 {
                problems.push(format!("{name} must be positive"));
            }
            if value > i32::MAX as usize {
                problems.push(format!("{name} must fit in a 32-bit signed integer"));
            }
        }
        if self.geometry.wkt_precision > MAX_WKT_PRECISION {
            problems.push(format!(
                "geometry.wkt_precision must be <= {MAX_WKT_PRECISION}"
            ));
        }
        if self.logging.filter.trim().is_empty() {
            problems.push("logging.filter must not be empty".to_string());
        }
        if let Some(path) = &self.engine.config_path {
            if path.as_os_str().is_empty() {
                problems.push("engine.config_path must not be empty".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "Validation failed: {}",
                problems.join(", ")
            )))
        }
    }
}
