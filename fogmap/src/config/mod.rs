//! Configuration for fog components.
//!
//! Each component has its own builder-style config with `DEFAULT_*`
//! constants. [`FogConfig`] groups them and deserializes from any serde
//! format, so a host application can embed it in its own settings file;
//! missing fields take their defaults.
//!
//! # Example
//!
//! ```
//! use fogmap::config::FogConfig;
//!
//! let config: FogConfig = serde_json::from_str(
//!     r#"{ "cache": { "max_cache_size": 25 }, "service": { "debounce_ms": 0 } }"#,
//! ).unwrap();
//! assert_eq!(config.cache.max_cache_size(), 25);
//! assert_eq!(config.spatial.buffer_distance(), 0.01);
//! ```

mod service;

use serde::{Deserialize, Serialize};

pub use service::{ServiceConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_LOCATION_RADIUS, DEFAULT_ZOOM};

use crate::cache::FogCacheConfig;
use crate::spatial::SpatialIndexConfig;

/// Configuration of every fog component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub spatial: SpatialIndexConfig,
    pub cache: FogCacheConfig,
    pub service: ServiceConfig,
}

impl FogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spatial(mut self, spatial: SpatialIndexConfig) -> Self {
        self.spatial = spatial;
        self
    }

    pub fn with_cache(mut self, cache: FogCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: FogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FogConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = FogConfig::new().with_cache(FogCacheConfig::new().with_max_cache_size(3));
        assert_eq!(config.cache.max_cache_size(), 3);
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_fallback_strategy_from_document() {
        let config: FogConfig =
            serde_json::from_str(r#"{ "service": { "fallback_strategy": "world" } }"#).unwrap();
        assert_eq!(
            config.service.fallback_strategy(),
            crate::fog::FallbackStrategy::World
        );
    }
}
