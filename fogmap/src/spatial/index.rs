//! R-tree backed store of revealed-area features.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use dashmap::DashMap;
use geojson::Feature;
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use super::types::{
    MemoryRecommendation, MemoryStats, OptimizationReport, QueryOptions, SpatialIndexConfig,
    ViewportQueryResult, CLEANUP_RECOMMENDED_RATIO,
};
use crate::coord::{degrees_per_pixel, ViewportBounds};
use crate::geometry::{bounding_box, ensure_id, rings, validate};

/// Fixed per-entry overhead (tree node share, id, feature struct).
const ENTRY_OVERHEAD_BYTES: usize = 256;
/// One `Vec<f64>` position holding lon/lat.
const POSITION_BYTES: usize = 2 * std::mem::size_of::<f64>() + 3 * std::mem::size_of::<usize>();
/// One ring `Vec` header.
const RING_BYTES: usize = 3 * std::mem::size_of::<usize>();

/// A feature stored in the tree along with its precomputed extent.
#[derive(Debug, Clone)]
struct IndexedFeature {
    id: String,
    feature: Feature,
    envelope: AABB<[f64; 2]>,
    /// Bounding box diagonal in degrees, used for level of detail.
    diagonal: f64,
}

impl PartialEq for IndexedFeature {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Usage bookkeeping kept next to the tree.
#[derive(Debug, Clone)]
struct EntryRecord {
    envelope: AABB<[f64; 2]>,
    access_count: u64,
    last_accessed: Instant,
    vertices: usize,
    estimated_bytes: usize,
}

impl EntryRecord {
    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

/// Spatial index over revealed-area polygons.
///
/// Queries take a read lock on the tree so they run concurrently; inserts,
/// removals and rebuilds take the write lock. Access statistics live in a
/// `DashMap` so queries can update them without upgrading the lock.
///
/// # Example
///
/// ```
/// use fogmap::coord::ViewportBounds;
/// use fogmap::geometry::rectangle_feature;
/// use fogmap::spatial::{QueryOptions, SpatialIndex};
///
/// let index = SpatialIndex::new();
/// index.add_feature(&rectangle_feature(&ViewportBounds::new(0.0, 0.0, 0.1, 0.1)));
///
/// let result = index.query_viewport(
///     &ViewportBounds::new(-1.0, -1.0, 1.0, 1.0),
///     &QueryOptions::default(),
/// );
/// assert_eq!(result.returned_features, 1);
/// ```
pub struct SpatialIndex {
    config: SpatialIndexConfig,
    tree: RwLock<RTree<IndexedFeature>>,
    records: DashMap<String, EntryRecord>,
}

impl SpatialIndex {
    /// Creates an empty index with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SpatialIndexConfig::default())
    }

    pub fn with_config(config: SpatialIndexConfig) -> Self {
        Self {
            config,
            tree: RwLock::new(RTree::new()),
            records: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SpatialIndexConfig {
        &self.config
    }

    /// Number of indexed features.
    pub fn len(&self) -> usize {
        self.read_tree().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a feature with this id is indexed.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Adds one feature, replacing any feature with the same id.
    ///
    /// Invalid features are dropped and `false` is returned.
    pub fn add_feature(&self, feature: &Feature) -> bool {
        let Some((entry, record)) = self.prepare(feature) else {
            return false;
        };
        let mut tree = self.write_tree();
        self.remove_locked(&mut tree, &entry.id);
        self.records.insert(entry.id.clone(), record);
        tree.insert(entry);
        true
    }

    /// Adds many features, returning how many were accepted.
    ///
    /// Into an empty index this bulk-loads the tree, which packs it far better
    /// than repeated inserts.
    pub fn add_features(&self, features: &[Feature]) -> usize {
        let prepared = self.prepare_all(features);
        let accepted = prepared.len();

        let mut tree = self.write_tree();
        if tree.size() == 0 {
            let (entries, records) = unique_entries(prepared);
            *tree = RTree::bulk_load(entries);
            self.replace_records(records);
        } else {
            for (entry, record) in prepared {
                self.remove_locked(&mut tree, &entry.id);
                self.records.insert(entry.id.clone(), record);
                tree.insert(entry);
            }
        }
        accepted
    }

    /// Removes a feature by id. Returns `false` if it was not indexed.
    pub fn remove_feature(&self, id: &str) -> bool {
        let mut tree = self.write_tree();
        self.remove_locked(&mut tree, id)
    }

    /// Drops every feature.
    pub fn clear(&self) {
        let mut tree = self.write_tree();
        *tree = RTree::new();
        self.records.clear();
    }

    /// Replaces the whole content with `features`.
    ///
    /// The replacement tree is packed before the write lock is taken and
    /// swapped in under a single guard, so concurrent queries see either the
    /// old content or the new one.
    pub fn rebuild(&self, features: &[Feature]) -> usize {
        let prepared = self.prepare_all(features);
        let accepted = prepared.len();
        let (entries, records) = unique_entries(prepared);
        let packed = RTree::bulk_load(entries);

        let mut tree = self.write_tree();
        *tree = packed;
        self.replace_records(records);
        drop(tree);

        debug!(accepted, "Spatial index rebuilt");
        accepted
    }

    /// Finds features intersecting the viewport.
    ///
    /// The bounds are grown by the buffer distance first. With level of detail
    /// enabled, features whose bbox diagonal spans fewer than the configured
    /// number of pixels at `zoom_level` are skipped. Results are ordered
    /// largest first, so truncation keeps the most visible areas.
    ///
    /// Inverted or non-finite bounds give an empty result.
    pub fn query_viewport(&self, bounds: &ViewportBounds, options: &QueryOptions) -> ViewportQueryResult {
        let started = Instant::now();
        if !(bounds.min_lon < bounds.max_lon && bounds.min_lat < bounds.max_lat) {
            debug!(?bounds, "Rejected inverted viewport query");
            return ViewportQueryResult::empty(started.elapsed());
        }

        let buffer = options
            .buffer_distance
            .filter(|b| b.is_finite() && *b >= 0.0)
            .unwrap_or(self.config.buffer_distance());
        let query_bounds = bounds.expand(buffer);
        let envelope = AABB::from_corners(
            [query_bounds.min_lon, query_bounds.min_lat],
            [query_bounds.max_lon, query_bounds.max_lat],
        );

        let tree = self.read_tree();
        let mut candidates: Vec<&IndexedFeature> =
            tree.locate_in_envelope_intersecting(&envelope).collect();
        let total_features = candidates.len();

        if options.use_level_of_detail {
            let threshold = self.config.lod_min_pixels() * degrees_per_pixel(options.zoom_level);
            candidates.retain(|entry| entry.diagonal >= threshold);
        }

        candidates.sort_by(|a, b| {
            b.diagonal
                .total_cmp(&a.diagonal)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(max) = options.max_results {
            candidates.truncate(max);
        }

        for entry in &candidates {
            if let Some(mut record) = self.records.get_mut(&entry.id) {
                record.touch();
            }
        }

        let features: Vec<Feature> = candidates.into_iter().map(|e| e.feature.clone()).collect();
        drop(tree);

        let result = ViewportQueryResult {
            returned_features: features.len(),
            features,
            total_features,
            query_time: started.elapsed(),
            level_of_detail_applied: options.use_level_of_detail,
            query_bounds: Some(query_bounds),
        };
        debug!(
            total = result.total_features,
            returned = result.returned_features,
            lod = result.level_of_detail_applied,
            "Viewport query"
        );
        result
    }

    /// Finds features within `radius` degrees of `center` (`(lon, lat)`).
    pub fn query_radius(&self, center: (f64, f64), radius: f64, options: &QueryOptions) -> ViewportQueryResult {
        self.query_viewport(&ViewportBounds::from_center_radius(center, radius), options)
    }

    /// Estimates how much memory the index holds.
    pub fn get_memory_stats(&self) -> MemoryStats {
        let mut estimated_memory_usage = 0usize;
        let mut vertices = 0usize;
        let mut feature_count = 0usize;
        for record in self.records.iter() {
            estimated_memory_usage += record.estimated_bytes;
            vertices += record.vertices;
            feature_count += 1;
        }

        let (average_complexity, memory_per_feature) = if feature_count == 0 {
            (0.0, 0.0)
        } else {
            (
                vertices as f64 / feature_count as f64,
                estimated_memory_usage as f64 / feature_count as f64,
            )
        };

        let max = self.config.max_memory_bytes();
        let recommendation = if estimated_memory_usage > max {
            MemoryRecommendation::CleanupRequired
        } else if estimated_memory_usage as f64 > max as f64 * CLEANUP_RECOMMENDED_RATIO
            || memory_per_feature > self.config.memory_per_feature_threshold() as f64
        {
            MemoryRecommendation::CleanupRecommended
        } else {
            MemoryRecommendation::Optimal
        };

        MemoryStats {
            estimated_memory_usage,
            feature_count,
            average_complexity,
            memory_per_feature,
            recommendation,
        }
    }

    /// Drops rarely used features and repacks the tree.
    ///
    /// A gentle pass removes the least recently queried fraction of entries.
    /// An aggressive pass also removes every entry queried fewer than the
    /// configured minimum number of times.
    pub fn optimize_memory(&self, aggressive: bool) -> OptimizationReport {
        let mut tree = self.write_tree();

        let mut by_age: Vec<(String, Instant, u64)> = self
            .records
            .iter()
            .map(|r| (r.key().clone(), r.last_accessed, r.access_count))
            .collect();
        by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let gentle = (by_age.len() as f64 * self.config.gentle_removal_fraction()).floor() as usize;
        let mut doomed: HashSet<String> = by_age.iter().take(gentle).map(|r| r.0.clone()).collect();
        if aggressive {
            let min = self.config.min_access_count();
            doomed.extend(by_age.iter().filter(|r| r.2 < min).map(|r| r.0.clone()));
        }

        if doomed.is_empty() {
            return OptimizationReport {
                removed: 0,
                remaining: tree.size(),
            };
        }

        let kept: Vec<IndexedFeature> = tree
            .iter()
            .filter(|entry| !doomed.contains(&entry.id))
            .cloned()
            .collect();
        self.records.retain(|id, _| !doomed.contains(id));
        *tree = RTree::bulk_load(kept);

        let report = OptimizationReport {
            removed: doomed.len(),
            remaining: tree.size(),
        };
        info!(
            removed = report.removed,
            remaining = report.remaining,
            aggressive,
            "Spatial index optimized"
        );
        report
    }

    fn prepare_all(&self, features: &[Feature]) -> Vec<(IndexedFeature, EntryRecord)> {
        let prepared: Vec<_> = features.iter().filter_map(|f| self.prepare(f)).collect();
        let dropped = features.len() - prepared.len();
        if dropped > 0 {
            debug!(dropped, "Dropped invalid features while indexing");
        }
        prepared
    }

    fn prepare(&self, feature: &Feature) -> Option<(IndexedFeature, EntryRecord)> {
        if !validate(feature).is_valid {
            return None;
        }
        let bbox = bounding_box(feature)?;
        let (id, feature) = ensure_id(feature);
        let envelope = AABB::from_corners([bbox.min_lon, bbox.min_lat], [bbox.max_lon, bbox.max_lat]);

        let ring_count = rings(&feature).count();
        let vertices: usize = rings(&feature).map(Vec::len).sum();
        let estimated_bytes =
            ENTRY_OVERHEAD_BYTES + id.len() + ring_count * RING_BYTES + vertices * POSITION_BYTES;

        let record = EntryRecord {
            envelope,
            access_count: 0,
            last_accessed: Instant::now(),
            vertices,
            estimated_bytes,
        };
        let entry = IndexedFeature {
            id,
            feature,
            envelope,
            diagonal: bbox.width().hypot(bbox.height()),
        };
        Some((entry, record))
    }

    /// Must be called with the tree write lock held.
    fn replace_records(&self, records: HashMap<String, EntryRecord>) {
        self.records.clear();
        for (id, record) in records {
            self.records.insert(id, record);
        }
    }

    fn remove_locked(&self, tree: &mut RTree<IndexedFeature>, id: &str) -> bool {
        let Some((_, record)) = self.records.remove(id) else {
            return false;
        };
        let stored = tree
            .locate_in_envelope(&record.envelope)
            .find(|entry| entry.id == id)
            .cloned();
        match stored {
            Some(entry) => tree.remove(&entry).is_some(),
            None => false,
        }
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, RTree<IndexedFeature>> {
        self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, RTree<IndexedFeature>> {
        self.tree.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Splits prepared entries into tree entries and records, keeping the last
/// entry for each id.
fn unique_entries(
    prepared: Vec<(IndexedFeature, EntryRecord)>,
) -> (Vec<IndexedFeature>, HashMap<String, EntryRecord>) {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(prepared.len());
    let mut entries: Vec<IndexedFeature> = Vec::with_capacity(prepared.len());
    let mut records = HashMap::with_capacity(prepared.len());
    for (entry, record) in prepared {
        records.insert(entry.id.clone(), record);
        match slots.get(&entry.id) {
            Some(&slot) => entries[slot] = entry,
            None => {
                slots.insert(entry.id.clone(), entries.len());
                entries.push(entry);
            }
        }
    }
    (entries, records)
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("config", &self.config)
            .field("features", &self.records.len())
            .finish()
    }
}
