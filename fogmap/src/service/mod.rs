//! Fog service.
//!
//! Wires the pieces into the request path used by a map screen:
//!
//! ```text
//! update_fog_for_viewport ──► debounce ──► cache ──hit──► FogResult
//!                                            │ miss
//!                                            ▼
//!                          spatial index ──► union ──► engine ──► cache ──► FogResult
//! ```
//!
//! Revealed areas are pulled from a [`RevealedAreaSource`]; the service never
//! performs storage I/O itself.
//!
//! # Example
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
//! let revealed = rectangle_feature(&ViewportBounds::new(0.0, 0.0, 1.0, 1.0));
//! let service = FogService::new(FogConfig::default(), Arc::new(StaticAreaSource::new(vec![revealed])));
//! service.refresh_revealed_areas().await.unwrap();
//!
//! let fog = service.compute_fog(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0), 12.0, false);
//! assert_eq!(fog.fog_geojson.features.len(), 1);
//! # }
//! ```

mod fog_service;
mod source;

pub use fog_service::FogService;
pub use source::{BoxFuture, RevealedAreaSource, StaticAreaSource};
