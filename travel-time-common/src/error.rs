//! Error types for the travel-time routing layer
//!
//! Errors fall into two scopes. Row-scoped errors (`GeometryDecode`,
//! `EngineRequest`) only null the output row that produced them; every other
//! variant aborts the whole calling operation because there is no natural
//! per-row place to report it.

use thiserror::Error;

/// Main error type for travel-time operations
#[derive(Debug, Error)]
pub enum Error {
    /// Engine configuration is missing, unreadable or rejected by the engine
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A routing operation ran before any successful load
    #[error("Router not loaded. Call travel_time_load_config() first.")]
    EngineNotLoaded,

    /// Neither the format sniffer nor the coordinate scan recovered a geometry
    #[error("Geometry decode failed: {0}")]
    GeometryDecode(String),

    /// Opaque engine-side failure, message passed through verbatim
    #[error("{0}")]
    EngineRequest(String),

    /// Malformed call arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure nulls a single row instead of aborting the batch.
    pub fn is_row_scoped(&self) -> bool {
        matches!(self, Error::GeometryDecode(_) | Error::EngineRequest(_))
    }

    /// Short stable label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::EngineNotLoaded => "engine_not_loaded",
            Error::GeometryDecode(_) => "geometry_decode",
            Error::EngineRequest(_) => "engine_request",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io(_) => "io",
        }
    }
}

/// Convenience result type for travel-time operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_scope() {
        assert!(Error::GeometryDecode("blob".into()).is_row_scoped());
        assert!(Error::EngineRequest("No path could be found".into()).is_row_scoped());

        assert!(!Error::EngineNotLoaded.is_row_scoped());
        assert!(!Error::Configuration("missing".into()).is_row_scoped());
        assert!(!Error::InvalidInput("lengths".into()).is_row_scoped());
    }

    #[test]
    fn test_engine_message_is_verbatim() {
        let err = Error::EngineRequest("No suitable edges near location".into());
        assert_eq!(err.to_string(), "No suitable edges near location");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "settings.toml");
        let err: Error = io.into();
        assert_eq!(err.kind(), "io");
        assert!(std::error::Error::source(&err).is_some());
    }
}
