//! Fogmap - fog of war for explored-area maps
//!
//! Computes the unexplored part of a map viewport from a set of revealed
//! polygons, and keeps that computation fast and crash-free while the
//! viewport moves.
//!
//! # Modules
//!
//! - [`geometry`]: polygon validation, repair and robust union/difference
//! - [`spatial`]: R-tree index over revealed areas with level of detail
//! - [`fog`]: fog calculation engine with a fallback chain
//! - [`cache`]: fog result cache with TTL, LRU eviction and invalidation
//! - [`service`]: debounced entry points tying the above together
//!
//! # High-Level API
//!
//! ```
//! use std::sync::Arc;
//! use fogmap::config::FogConfig;
//! use fogmap::coord::ViewportBounds;
//! use fogmap::geometry::rectangle_feature;
//! use fogmap::service::{FogService, StaticAreaSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let walked = rectangle_feature(&ViewportBounds::new(2.35, 48.85, 2.36, 48.86));
//! let source = Arc::new(StaticAreaSource::new(vec![walked]));
//! let service = Arc::new(FogService::new(FogConfig::default(), source));
//! service.refresh_revealed_areas().await.unwrap();
//!
//! let fog = service
//!     .update_fog_for_viewport(ViewportBounds::new(2.3, 48.8, 2.4, 48.9), Some(13.0), false)
//!     .await
//!     .expect("no newer update was issued");
//! assert!(!fog.had_errors());
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod error;
pub mod fog;
pub mod geometry;
pub mod log;
pub mod logging;
pub mod service;
pub mod spatial;

pub use error::FogError;

/// Version of the fogmap library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
