//! Identity recognition against the enrolled store.

use crate::constants::DEFAULT_SIMILARITY_THRESHOLD;
use crate::identity::IdentityStore;
use crate::signature::FaceSignature;
use log::debug;

/// Cosine-similarity recognition over the identity store.
///
/// The scan returns the FIRST record in the store's enumeration order whose
/// similarity strictly exceeds the threshold — not the best-scoring record.
/// Downstream alerting depends on which identity is recognized first, so
/// this semantic is part of the contract.
#[derive(Debug, Clone)]
pub struct RecognitionEngine {
    threshold: f32,
}

impl Default for RecognitionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl RecognitionEngine {
    /// Create an engine with the given similarity threshold.
    ///
    /// The threshold trades recall for precision; useful values lie in
    /// (0, 1]. No bounds are enforced.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Current similarity threshold
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Match a signature against the store.
    ///
    /// Returns the first qualifying identity and its similarity score, or
    /// `(None, 0.0)` when no record qualifies. The store is not mutated.
    #[must_use]
    pub fn recognize(&self, store: &IdentityStore, signature: &FaceSignature) -> (Option<String>, f32) {
        for (id, enrolled) in store.iter() {
            let score = signature.cosine_similarity(enrolled);
            if score > self.threshold {
                debug!("Recognized {} with similarity {:.3}", id, score);
                return (Some(id.clone()), score);
            }
        }

        (None, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(values: &[f32]) -> FaceSignature {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        FaceSignature::from_raw(values.iter().map(|v| v / norm).collect())
    }

    #[test]
    fn test_empty_store_returns_none() {
        let engine = RecognitionEngine::default();
        let store = IdentityStore::new();
        let query = unit(&[1.0, 0.0, 0.0]);

        assert_eq!(engine.recognize(&store, &query), (None, 0.0));
    }

    #[test]
    fn test_first_match_wins_over_better_later_match() {
        // "alice" scores 0.8 against the query, "bob" scores 1.0; both
        // exceed the threshold, so enumeration order decides: alice.
        let mut store = IdentityStore::new();
        store.insert("alice", unit(&[0.8, 0.6, 0.0]));
        store.insert("bob", unit(&[1.0, 0.0, 0.0]));

        let engine = RecognitionEngine::new(0.75);
        let query = unit(&[1.0, 0.0, 0.0]);

        let (id, score) = engine.recognize(&store, &query);
        assert_eq!(id.as_deref(), Some("alice"));
        assert!((score - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_below_threshold_returns_none() {
        let mut store = IdentityStore::new();
        store.insert("alice", unit(&[0.0, 1.0, 0.0]));

        let engine = RecognitionEngine::new(0.75);
        let query = unit(&[1.0, 0.0, 0.0]);

        assert_eq!(engine.recognize(&store, &query), (None, 0.0));
    }

    #[test]
    fn test_threshold_is_strict() {
        // A score exactly equal to the threshold does not qualify.
        let mut store = IdentityStore::new();
        store.insert("alice", unit(&[1.0, 0.0, 0.0]));

        let engine = RecognitionEngine::new(1.0);
        let query = unit(&[1.0, 0.0, 0.0]);

        let (id, _) = engine.recognize(&store, &query);
        assert_eq!(id, None);
    }

    #[test]
    fn test_degenerate_query_never_matches() {
        let mut store = IdentityStore::new();
        store.insert("alice", unit(&[1.0, 0.0, 0.0]));

        let engine = RecognitionEngine::new(0.5);
        let query = FaceSignature::from_raw(vec![0.0, 0.0, 0.0]);

        assert_eq!(engine.recognize(&store, &query), (None, 0.0));
    }
}
