//! The fog service: cache, index, union and engine wired together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::RevealedAreaSource;
use crate::cache::{run_expiry_daemon, FogCache};
use crate::config::FogConfig;
use crate::coord::{zoom_bucket, ViewportBounds};
use crate::error::FogError;
use crate::fog::{FogEngine, FogOptions, FogResult};
use crate::geometry::{fingerprint, union_detailed};
use crate::log::{Logger, TracingLogger};
use crate::spatial::{QueryOptions, SpatialIndex};
use crate::{log_error, log_info, log_warn};

/// Owns the spatial index, the result cache and the engine, and serves fog
/// for viewport and location updates.
///
/// The index is filled from a [`RevealedAreaSource`] by
/// [`refresh_revealed_areas`](Self::refresh_revealed_areas). Updates are
/// debounced: only the newest call within the debounce window computes, and
/// a result that is superseded while it was being computed is discarded.
pub struct FogService {
    config: FogConfig,
    engine: FogEngine,
    index: SpatialIndex,
    cache: Arc<FogCache>,
    source: Arc<dyn RevealedAreaSource>,
    logger: Arc<dyn Logger>,
    /// Fingerprint of the loaded revealed-area set; `None` before the first load.
    fingerprint: RwLock<Option<String>>,
    generation: AtomicU64,
}

impl FogService {
    /// Creates a service logging through `tracing`.
    pub fn new(config: FogConfig, source: Arc<dyn RevealedAreaSource>) -> Self {
        Self::with_logger(config, source, Arc::new(TracingLogger))
    }

    pub fn with_logger(
        config: FogConfig,
        source: Arc<dyn RevealedAreaSource>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            engine: FogEngine::new(Arc::clone(&logger)),
            index: SpatialIndex::with_config(config.spatial),
            cache: Arc::new(FogCache::new(config.cache)),
            config,
            source,
            logger,
            fingerprint: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &FogConfig {
        &self.config
    }

    pub fn engine(&self) -> &FogEngine {
        &self.engine
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn cache(&self) -> &Arc<FogCache> {
        &self.cache
    }

    /// Fingerprint of the currently indexed revealed areas.
    pub fn current_fingerprint(&self) -> Option<String> {
        self.fingerprint
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Reloads revealed areas from the source and rebuilds the index.
    ///
    /// Cached results computed from any other revealed-area set are dropped.
    /// Returns the number of features indexed.
    ///
    /// # Errors
    ///
    /// Returns the source's error; the index and cache are left untouched.
    pub async fn refresh_revealed_areas(&self) -> Result<usize, FogError> {
        let features = match self.source.load_revealed_areas().await {
            Ok(features) => features,
            Err(e) => {
                log_warn!(self.logger, "Failed to load revealed areas: {}", e);
                return Err(e);
            }
        };

        let current = fingerprint(&features);
        let indexed = self.index.rebuild(&features);
        let invalidated = self.cache.invalidate(Some(&current));
        *self.fingerprint.write().unwrap_or_else(|p| p.into_inner()) = Some(current);

        if indexed < features.len() {
            log_warn!(
                self.logger,
                "Dropped {} invalid revealed areas",
                features.len() - indexed
            );
        }
        log_info!(
            self.logger,
            "Loaded {} revealed areas ({} cached results invalidated)",
            indexed,
            invalidated
        );
        Ok(indexed)
    }

    /// Computes fog for a viewport right away, without debouncing.
    ///
    /// Pipeline: cache lookup, spatial query (with level of detail at `zoom`),
    /// union of the candidates, fog with fallback, cache store. Results that
    /// report errors are returned but not cached. While `is_viewport_changing`
    /// is set the boolean operation is skipped and the result is cached as
    /// intermediate.
    ///
    /// `zoom` is snapped up to a whole level with [`zoom_bucket`]; level of
    /// detail is applied at that level and final results are cached per
    /// level, so a coarse result is never served to a finer zoom.
    pub fn compute_fog(&self, bounds: ViewportBounds, zoom: f64, is_viewport_changing: bool) -> FogResult {
        let started = Instant::now();
        let current = self
            .current_fingerprint()
            .unwrap_or_else(|| fingerprint(&[]));
        let bucket = zoom_bucket(zoom);
        // Intermediate fog is a plain rectangle at every zoom
        let cache_zoom = (!is_viewport_changing).then_some(bucket);

        if let Some(hit) = self
            .cache
            .get_at_zoom(&bounds, &current, is_viewport_changing, cache_zoom)
        {
            debug!(?bounds, intermediate = is_viewport_changing, zoom = bucket, "Fog cache hit");
            return hit;
        }

        let options = FogOptions {
            viewport_bounds: Some(bounds),
            use_viewport_optimization: self.config.service.use_viewport_optimization(),
            fallback_strategy: self.config.service.fallback_strategy(),
        };

        let mut result = if is_viewport_changing {
            self.engine.create_fog_features(None, &options, true)
        } else {
            let query = QueryOptions {
                buffer_distance: None,
                max_results: self.config.service.max_query_results(),
                use_level_of_detail: true,
                zoom_level: f64::from(bucket),
            };
            let candidates = self.index.query_viewport(&bounds, &query);
            let merged = union_detailed(&candidates.features);
            if merged.skipped > 0 || !merged.errors.is_empty() {
                warn!(
                    skipped = merged.skipped,
                    errors = merged.errors.len(),
                    "Revealed-area union was incomplete"
                );
            }

            let mut result = self.engine.create_fog_features(merged.result.as_ref(), &options, false);
            if !merged.errors.is_empty() {
                result.performance_metrics.had_errors = true;
            }
            let (mut errors, mut warnings) = (merged.errors, merged.warnings);
            errors.append(&mut result.errors);
            warnings.append(&mut result.warnings);
            result.errors = errors;
            result.warnings = warnings;
            result
        };
        result.calculation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        if !result.had_errors() {
            self.cache
                .set_at_zoom(&bounds, &current, &result, is_viewport_changing, cache_zoom);
        }
        result
    }

    /// Debounced fog update for a viewport.
    ///
    /// Returns `None` when a newer update arrived during the debounce window
    /// or while this one was computing. `zoom` defaults to the configured zoom.
    ///
    /// The computation runs on the blocking thread pool. If it panics there,
    /// simplified fog is returned with the failure in `errors`.
    pub async fn update_fog_for_viewport(
        self: &Arc<Self>,
        bounds: ViewportBounds,
        zoom: Option<f64>,
        is_viewport_changing: bool,
    ) -> Option<FogResult> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let debounce = self.config.service.debounce();
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
            if self.is_superseded(generation) {
                debug!(generation, "Fog update superseded during debounce");
                return None;
            }
        }

        let zoom = zoom.unwrap_or(self.config.service.default_zoom());
        let service = Arc::clone(self);
        let result = match tokio::task::spawn_blocking(move || {
            service.compute_fog(bounds, zoom, is_viewport_changing)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => self.failed_computation(bounds, &e.to_string()),
        };

        if self.is_superseded(generation) {
            debug!(generation, "Discarding stale fog result");
            return None;
        }
        Some(result)
    }

    /// Debounced fog update around a location (`(lon, lat)`).
    pub async fn update_fog_for_location(self: &Arc<Self>, location: (f64, f64), zoom: Option<f64>) -> Option<FogResult> {
        let bounds = ViewportBounds::from_center_radius(location, self.config.service.location_radius());
        self.update_fog_for_viewport(bounds, zoom, false).await
    }

    /// Starts the cache expiry daemon at the configured interval.
    pub fn spawn_expiry_daemon(&self, cancellation: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(run_expiry_daemon(
            Arc::clone(&self.cache),
            self.config.cache.cleanup_interval(),
            cancellation,
        ))
    }

    /// Forgets loaded areas and cached results, and cancels pending updates.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.index.clear();
        self.cache.clear();
        self.cache.reset_stats();
        *self.fingerprint.write().unwrap_or_else(|p| p.into_inner()) = None;
        info!("Fog service reset");
    }

    fn failed_computation(&self, bounds: ViewportBounds, reason: &str) -> FogResult {
        log_error!(self.logger, "Fog computation task failed: {}", reason);
        let mut result = self.engine.calculate_simplified_fog(Some(bounds));
        result.errors.insert(0, format!("fog computation task failed: {}", reason));
        result.performance_metrics.had_errors = true;
        result
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}

impl std::fmt::Debug for FogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FogService")
            .field("config", &self.config)
            .field("index", &self.index)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::geometry::{polygon_feature, rectangle_feature, rings, with_id};
    use crate::log::MemoryLogger;
    use crate::service::{BoxFuture, StaticAreaSource};
    use geojson::{Feature, Value};
    use std::time::Duration;

    fn square(id: &str, x: f64, y: f64, size: f64) -> Feature {
        with_id(&rectangle_feature(&ViewportBounds::new(x, y, x + size, y + size)), id)
    }

    fn no_debounce() -> FogConfig {
        FogConfig::new().with_service(ServiceConfig::new().with_debounce(Duration::ZERO))
    }

    async fn loaded_service(features: Vec<Feature>, config: FogConfig) -> Arc<FogService> {
        let service = Arc::new(FogService::new(config, Arc::new(StaticAreaSource::new(features))));
        service.refresh_revealed_areas().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_refresh_indexes_and_fingerprints() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        assert_eq!(service.index().len(), 1);
        assert_eq!(
            service.current_fingerprint(),
            Some(fingerprint(&[square("a", 0.0, 0.0, 1.0)]))
        );
    }

    #[tokio::test]
    async fn test_refresh_drops_invalid_features() {
        let broken = polygon_feature(vec![vec![vec![0.0, 0.0]]]);
        let service = FogService::new(
            no_debounce(),
            Arc::new(StaticAreaSource::new(vec![broken, square("a", 0.0, 0.0, 1.0)])),
        );
        assert_eq!(service.refresh_revealed_areas().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_state() {
        struct Offline;
        impl RevealedAreaSource for Offline {
            fn load_revealed_areas(&self) -> BoxFuture<'_, Result<Vec<Feature>, FogError>> {
                Box::pin(async { Err(FogError::Source("offline".to_string())) })
            }
        }

        let logger = Arc::new(MemoryLogger::new());
        let service = FogService::with_logger(no_debounce(), Arc::new(Offline), logger.clone());
        assert!(service.refresh_revealed_areas().await.is_err());
        assert!(service.current_fingerprint().is_none());
        assert!(logger.contains("offline"));
    }

    #[tokio::test]
    async fn test_compute_square_with_hole() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        let result = service.compute_fog(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0), 12.0, false);

        assert!(!result.had_errors());
        match &result.fog_feature().unwrap().geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => assert_eq!(rings.len(), 2),
            other => panic!("expected polygon with hole, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compute_unions_candidates() {
        let service = loaded_service(
            vec![square("a", 0.0, 0.0, 1.0), square("b", 1.0, 0.0, 1.0)],
            no_debounce(),
        )
        .await;
        // Both halves together cover the viewport
        let result = service.compute_fog(ViewportBounds::new(0.25, 0.25, 1.75, 0.75), 12.0, false);
        assert!(result.is_clear());
        assert!(!result.had_errors());
    }

    #[tokio::test]
    async fn test_compute_uses_cache() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        let bounds = ViewportBounds::new(-1.0, -1.0, 2.0, 2.0);

        service.compute_fog(bounds, 12.0, false);
        service.compute_fog(bounds, 12.0, false);

        let stats = service.cache().get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_zoom_levels_are_cached_separately() {
        let service = loaded_service(vec![square("tiny", 0.0, 0.0, 0.0001)], no_debounce()).await;
        let bounds = ViewportBounds::new(-0.01, -0.01, 0.01, 0.01);

        // Too small to survive level of detail at zoom 4
        let coarse = service.compute_fog(bounds, 4.0, false);
        assert_eq!(rings(coarse.fog_feature().unwrap()).count(), 1);

        let fine = service.compute_fog(bounds, 18.0, false);
        assert_eq!(rings(fine.fog_feature().unwrap()).count(), 2);
        assert_eq!(service.cache().len(), 2);

        // Fractional zooms share the bucket above them
        service.compute_fog(bounds, 17.5, false);
        assert_eq!(service.cache().get_stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_refresh_invalidates_stale_results() {
        let source = Arc::new(StaticAreaSource::new(vec![square("a", 0.0, 0.0, 1.0)]));
        let service = FogService::new(no_debounce(), source.clone());
        service.refresh_revealed_areas().await.unwrap();

        let bounds = ViewportBounds::new(-1.0, -1.0, 2.0, 2.0);
        service.compute_fog(bounds, 12.0, false);
        assert_eq!(service.cache().len(), 1);

        source.replace(vec![square("b", -2.0, -2.0, 5.0)]);
        service.refresh_revealed_areas().await.unwrap();
        assert!(service.cache().is_empty());

        let result = service.compute_fog(bounds, 12.0, false);
        assert!(result.is_clear());
    }

    #[tokio::test]
    async fn test_invalid_bounds_fall_back_and_are_not_cached() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        let result = service.compute_fog(ViewportBounds::new(1.0, 1.0, -1.0, -1.0), 12.0, false);

        assert!(result.had_errors());
        assert!(result.fallback_used());
        assert!(result.fog_feature().is_some());
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_viewport_changing_is_cached_as_intermediate() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        let bounds = ViewportBounds::new(-1.0, -1.0, 2.0, 2.0);

        let moving = service.compute_fog(bounds, 12.0, true);
        assert_eq!(rings(moving.fog_feature().unwrap()).count(), 1);

        let settled = service.compute_fog(bounds, 12.0, false);
        assert_eq!(rings(settled.fog_feature().unwrap()).count(), 2);
        assert_eq!(service.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_update_without_debounce() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        let result = service
            .update_fog_for_viewport(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0), None, false)
            .await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_debounce_keeps_only_latest() {
        let config = FogConfig::new()
            .with_service(ServiceConfig::new().with_debounce(Duration::from_millis(20)));
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], config).await;

        let first = service.update_fog_for_viewport(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0), None, false);
        let second = service.update_fog_for_viewport(ViewportBounds::new(-2.0, -2.0, 2.0, 2.0), None, false);
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_none());
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn test_update_for_location() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        // Standing inside the revealed square with a small radius
        let result = service.update_fog_for_location((0.5, 0.5), Some(15.0)).await.unwrap();
        assert!(result.is_clear());

        let elsewhere = service.update_fog_for_location((30.0, 30.0), None).await.unwrap();
        assert!(!elsewhere.is_clear());
    }

    #[tokio::test]
    async fn test_failed_computation_degrades_to_simplified_fog() {
        let logger = Arc::new(MemoryLogger::new());
        let service = FogService::with_logger(
            no_debounce(),
            Arc::new(StaticAreaSource::default()),
            logger.clone(),
        );
        let bounds = ViewportBounds::new(0.0, 0.0, 1.0, 1.0);

        let result = service.failed_computation(bounds, "task panicked");

        assert!(result.had_errors());
        assert!(result.fallback_used());
        assert!(result.errors[0].contains("task panicked"));
        assert_eq!(rings(result.fog_feature().unwrap()).count(), 1);
        assert!(logger.contains("task panicked"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_runs_on_multi_thread_runtime() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        let result = service
            .update_fog_for_viewport(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0), Some(12.0), false)
            .await
            .unwrap();
        assert_eq!(rings(result.fog_feature().unwrap()).count(), 2);
    }

    #[tokio::test]
    async fn test_reset() {
        let service = loaded_service(vec![square("a", 0.0, 0.0, 1.0)], no_debounce()).await;
        service.compute_fog(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0), 12.0, false);

        service.reset();
        assert!(service.index().is_empty());
        assert!(service.cache().is_empty());
        assert_eq!(service.cache().get_stats().cache_misses, 0);
        assert!(service.current_fingerprint().is_none());
    }

    #[tokio::test]
    async fn test_spawned_daemon_stops_on_cancel() {
        let service = loaded_service(Vec::new(), no_debounce()).await;
        let cancellation = CancellationToken::new();
        let handle = service.spawn_expiry_daemon(cancellation.clone());
        cancellation.cancel();
        handle.await.unwrap();
    }
}
