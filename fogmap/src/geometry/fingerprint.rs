//! Revealed-area fingerprinting.

use geojson::Feature;
use sha2::{Digest, Sha256};

use super::feature::{feature_id, polygon_sets};

/// Calculate a SHA-256 fingerprint of a revealed-area set.
///
/// Covers ids and every coordinate, so any edit to the set yields a new
/// fingerprint. Order-sensitive. Returns the digest as a lowercase hex string.
pub fn fingerprint(features: &[Feature]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((features.len() as u64).to_le_bytes());

    for feature in features {
        match feature_id(feature) {
            Some(id) => {
                hasher.update(b"id:");
                hasher.update(id.as_bytes());
            }
            None => hasher.update(b"noid"),
        }

        for rings in polygon_sets(feature).unwrap_or_default() {
            hasher.update(b"P");
            for ring in rings {
                hasher.update(b"R");
                hasher.update((ring.len() as u64).to_le_bytes());
                for position in ring {
                    for value in position.iter().take(2) {
                        hasher.update(value.to_bits().to_le_bytes());
                    }
                }
            }
        }
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::feature::{polygon_feature, with_id};

    fn square(x: f64) -> Feature {
        polygon_feature(vec![vec![
            vec![x, 0.0],
            vec![x + 1.0, 0.0],
            vec![x + 1.0, 1.0],
            vec![x, 0.0],
        ]])
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let set = vec![square(0.0), square(2.0)];
        assert_eq!(fingerprint(&set), fingerprint(&set.clone()));
        assert_eq!(fingerprint(&set).len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_coordinates() {
        assert_ne!(fingerprint(&[square(0.0)]), fingerprint(&[square(0.5)]));
    }

    #[test]
    fn test_fingerprint_changes_with_id() {
        let a = with_id(&square(0.0), "a");
        let b = with_id(&square(0.0), "b");
        assert_ne!(fingerprint(&[a]), fingerprint(&[b]));
    }

    #[test]
    fn test_fingerprint_of_empty_set() {
        assert_eq!(fingerprint(&[]), fingerprint(&[]));
        assert_ne!(fingerprint(&[]), fingerprint(&[square(0.0)]));
    }
}
