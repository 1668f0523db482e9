//! Persistent store of enrolled identities and their face signatures.
//!
//! The store is a single JSON blob read once at process start and written
//! once at shutdown. Enrollment happens out of band; at runtime the store is
//! only read by the recognition engine.

use crate::signature::FaceSignature;
use crate::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Mapping of identity id to enrolled face signature.
///
/// Backed by a `BTreeMap` so enumeration order is consistent (lexicographic
/// by id) — recognition depends on a well-defined scan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityStore {
    records: BTreeMap<String, FaceSignature>,
}

impl IdentityStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from disk.
    ///
    /// A missing, unreadable or corrupt file yields an empty store rather
    /// than an error: a cold start with no enrollment data is a valid state.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Identity store not loaded from {}: {}. Starting with an empty store.",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<BTreeMap<String, FaceSignature>>(&content) {
            Ok(records) => {
                info!("Loaded {} enrolled identities from {}", records.len(), path.display());
                Self { records }
            }
            Err(e) => {
                warn!(
                    "Identity store at {} is corrupt: {}. Starting with an empty store.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the store to disk as a single JSON blob.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails. Losing
    /// enrollment data is an operational failure the caller must see.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string(&self.records)?;
        std::fs::write(path.as_ref(), content)?;
        info!(
            "Saved {} enrolled identities to {}",
            self.records.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Insert or replace an enrolled identity
    pub fn insert(&mut self, id: impl Into<String>, signature: FaceSignature) {
        self.records.insert(id.into(), signature);
    }

    /// Look up a single identity's signature
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FaceSignature> {
        self.records.get(id)
    }

    /// Iterate records in enumeration order (lexicographic by id)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FaceSignature)> {
        self.records.iter()
    }

    /// Number of enrolled identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no identities are enrolled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_empty_store() {
        let store = IdentityStore::load("/nonexistent/path/identities.json");
        assert!(store.is_empty());
    }

    #[test]
    fn test_enumeration_order_is_lexicographic() {
        let mut store = IdentityStore::new();
        store.insert("charlie", FaceSignature::from_raw(vec![0.0, 0.0, 1.0]));
        store.insert("alice", FaceSignature::from_raw(vec![1.0, 0.0, 0.0]));
        store.insert("bob", FaceSignature::from_raw(vec![0.0, 1.0, 0.0]));

        let ids: Vec<&String> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["alice", "bob", "charlie"]);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut store = IdentityStore::new();
        store.insert("alice", FaceSignature::from_raw(vec![1.0]));
        store.insert("alice", FaceSignature::from_raw(vec![2.0]));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("alice").map(FaceSignature::as_slice), Some([2.0f32].as_slice()));
    }
}
