//! Face signature extraction from facial landmark geometry.
//!
//! A signature is a fixed-length vector summarizing the shape of a face,
//! invariant to translation, uniform scale and overall magnitude. Signatures
//! from the same landmark topology are directly comparable with cosine
//! similarity; mixing topologies is undefined and must be prevented by the
//! caller.

use crate::landmark_detection::LandmarkPoint;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// Normalized geometric summary of a face's landmark set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceSignature {
    values: Vec<f32>,
}

impl FaceSignature {
    /// Extract a signature from an ordered landmark set.
    ///
    /// The points are centered on their centroid, divided by the maximum
    /// absolute coordinate, flattened and divided by the Euclidean norm.
    /// Degenerate inputs (all points identical) skip the normalization steps
    /// whose divisor would be zero and yield a well-defined zero vector.
    #[must_use]
    pub fn from_landmarks(points: &[LandmarkPoint]) -> Self {
        if points.is_empty() {
            return Self { values: Vec::new() };
        }

        #[allow(clippy::cast_precision_loss)] // landmark counts are small
        let n = points.len() as f32;
        let mut centroid = [0.0f32; 3];
        for p in points {
            centroid[0] += p.x;
            centroid[1] += p.y;
            centroid[2] += p.z;
        }
        centroid[0] /= n;
        centroid[1] /= n;
        centroid[2] /= n;

        let mut values = Vec::with_capacity(points.len() * 3);
        for p in points {
            values.push(p.x - centroid[0]);
            values.push(p.y - centroid[1]);
            values.push(p.z - centroid[2]);
        }

        let max_abs = values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if max_abs > 0.0 {
            for v in &mut values {
                *v /= max_abs;
            }
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }

        Self { values }
    }

    /// Build a signature from an already-normalized vector (store loading)
    #[must_use]
    pub fn from_raw(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Vector length (fixed per landmark topology)
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for the empty signature produced from an empty landmark set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw vector values
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Cosine similarity with another signature.
    ///
    /// Returns 0.0 when the vectors differ in length or either has zero
    /// norm, so degenerate signatures never match anything.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.values.iter().zip(&other.values) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    /// Content fingerprint over the exact byte representation of the vector.
    ///
    /// Two signatures share a fingerprint only when bit-identical; nearby
    /// geometry produces distinct keys. Used as the capture-throttle key.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for v in &self.values {
            hasher.write(&v.to_le_bytes());
        }
        hasher.finish()
    }
}
