//! Error types for fog computation.
//!
//! Most of the fog pipeline never returns these to the caller: the boolean-op
//! wrapper, the engine and the service catch them at their boundary and render
//! them into the `errors`/`warnings` lists of their outcome objects. They are
//! returned directly only by the few operations whose contract is fallible
//! (bounds validation, viewport polygon construction, revealed-area loading).

use thiserror::Error;

/// Errors raised by fog computation components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FogError {
    /// Viewport bounds are inverted, non-finite or outside the valid range.
    #[error(
        "invalid viewport bounds [{min_lon}, {min_lat}, {max_lon}, {max_lat}]: {reason}"
    )]
    InvalidBounds {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
        reason: String,
    },

    /// A feature failed geometry validation.
    #[error("geometry validation failed: {0}")]
    GeometryValidation(String),

    /// The underlying boolean-geometry operation failed.
    #[error("boolean {operation} failed: {message}")]
    BooleanOperation {
        operation: &'static str,
        message: String,
    },

    /// A cache entry was found under a key it was not stored with.
    #[error("cache key mismatch")]
    CacheKeyMismatch,

    /// The revealed-area source failed to produce features.
    #[error("revealed-area source failed: {0}")]
    Source(String),
}

impl FogError {
    /// Creates a boolean operation failure from a panic payload.
    pub(crate) fn from_panic(operation: &'static str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic in geometry library".to_string()
        };
        Self::BooleanOperation { operation, message }
    }
}
