pub mod batch;
pub mod dispatch;
pub mod engine;
pub mod functions;
pub mod geometry;
pub mod logging;
pub mod matrix;
pub mod session;
pub mod settings;

pub use dispatch::RouteDispatcher;
pub use engine::{EngineLoader, Router};
pub use functions::{RouteRow, TravelTime};
pub use geometry::{GeometryPayload, GeometryValue, Point};
pub use matrix::{MatrixRequest, MatrixStream};
pub use session::{LoadOutcome, ReloadPolicy, RouterSession};
pub use settings::Settings;
pub use travel_time_common::{Error, Result};
