//! Common types for the travel-time routing layer

pub mod error;

pub use error::{Error, Result};
