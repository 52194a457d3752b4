//! Fog service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fog::FallbackStrategy;

/// Default debounce window for viewport and location updates.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Default half-size, in degrees, of the area around a location update (~5 km).
pub const DEFAULT_LOCATION_RADIUS: f64 = 0.05;

/// Default zoom used for level of detail when the caller gives none.
pub const DEFAULT_ZOOM: f64 = 12.0;

/// Configuration for [`FogService`](crate::service::FogService).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fogmap::config::ServiceConfig;
/// use fogmap::fog::FallbackStrategy;
///
/// let config = ServiceConfig::new()
///     .with_debounce(Duration::ZERO)
///     .with_fallback_strategy(FallbackStrategy::World);
/// assert_eq!(config.debounce(), Duration::ZERO);
/// assert_eq!(config.max_query_results(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    debounce_ms: u64,
    location_radius: f64,
    default_zoom: f64,
    fallback_strategy: FallbackStrategy,
    use_viewport_optimization: bool,
    max_query_results: Option<usize>,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window. Zero disables debouncing.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce_ms = window.as_millis() as u64;
        self
    }

    /// Set the radius, in degrees, of the viewport built around a location.
    pub fn with_location_radius(mut self, degrees: f64) -> Self {
        self.location_radius = degrees.abs();
        self
    }

    pub fn with_default_zoom(mut self, zoom: f64) -> Self {
        self.default_zoom = zoom;
        self
    }

    pub fn with_fallback_strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback_strategy = strategy;
        self
    }

    pub fn with_viewport_optimization(mut self, enabled: bool) -> Self {
        self.use_viewport_optimization = enabled;
        self
    }

    /// Cap the number of revealed areas pulled from the index per calculation.
    pub fn with_max_query_results(mut self, max: Option<usize>) -> Self {
        self.max_query_results = max;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn location_radius(&self) -> f64 {
        self.location_radius
    }

    pub fn default_zoom(&self) -> f64 {
        self.default_zoom
    }

    pub fn fallback_strategy(&self) -> FallbackStrategy {
        self.fallback_strategy
    }

    pub fn use_viewport_optimization(&self) -> bool {
        self.use_viewport_optimization
    }

    pub fn max_query_results(&self) -> Option<usize> {
        self.max_query_results
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            location_radius: DEFAULT_LOCATION_RADIUS,
            default_zoom: DEFAULT_ZOOM,
            fallback_strategy: FallbackStrategy::Viewport,
            use_viewport_optimization: true,
            max_query_results: None,
        }
    }
}
