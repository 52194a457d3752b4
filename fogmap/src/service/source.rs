//! Where revealed areas come from.

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use geojson::Feature;

use crate::error::FogError;

/// Boxed future returned by [`RevealedAreaSource`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Asynchronous provider of the revealed-area polygons currently known.
///
/// The service only reads from a source; it never writes back.
pub trait RevealedAreaSource: Send + Sync {
    /// Loads every revealed area.
    fn load_revealed_areas(&self) -> BoxFuture<'_, Result<Vec<Feature>, FogError>>;
}

/// In-memory source, useful for tests and for hosts that already hold the
/// features.
#[derive(Debug, Default)]
pub struct StaticAreaSource {
    features: RwLock<Vec<Feature>>,
}

impl StaticAreaSource {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features: RwLock::new(features),
        }
    }

    /// Replaces the held features. Takes effect on the next load.
    pub fn replace(&self, features: Vec<Feature>) {
        *self.features.write().unwrap_or_else(|p| p.into_inner()) = features;
    }

    /// Appends one feature.
    pub fn push(&self, feature: Feature) {
        self.features
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevealedAreaSource for StaticAreaSource {
    fn load_revealed_areas(&self) -> BoxFuture<'_, Result<Vec<Feature>, FogError>> {
        let features = self.features.read().unwrap_or_else(|p| p.into_inner()).clone();
        Box::pin(async move { Ok(features) })
    }
}
