//! Attire color compliance classification over named HSV ranges.

use serde::{Deserialize, Serialize};

/// Named inclusive bounds in HSV space defining one approved color category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    /// Category name reported in compliance results
    pub name: String,
    /// Inclusive lower HSV bound
    pub lower: [u8; 3],
    /// Inclusive upper HSV bound
    pub upper: [u8; 3],
}

impl ColorRange {
    /// Create a named range
    #[must_use]
    pub fn new(name: impl Into<String>, lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
        }
    }

    /// Inclusive containment on all three channels
    #[must_use]
    pub fn contains(&self, color: (u8, u8, u8)) -> bool {
        let channels = [color.0, color.1, color.2];
        channels
            .iter()
            .enumerate()
            .all(|(i, &c)| self.lower[i] <= c && c <= self.upper[i])
    }
}

/// Stateless range-membership classifier over the configured palette
#[derive(Debug, Clone, Default)]
pub struct ComplianceClassifier {
    ranges: Vec<ColorRange>,
}

impl ComplianceClassifier {
    /// Build a classifier from the configured named ranges
    #[must_use]
    pub fn new(ranges: Vec<ColorRange>) -> Self {
        Self { ranges }
    }

    /// True when the color falls inside ANY configured range
    #[must_use]
    pub fn is_allowed(&self, color: (u8, u8, u8)) -> bool {
        self.ranges.iter().any(|r| r.contains(color))
    }

    /// Names of ALL ranges containing the color, in configuration order.
    ///
    /// Reports every satisfied category, not just the first.
    #[must_use]
    pub fn matching_categories(&self, color: (u8, u8, u8)) -> Vec<String> {
        self.ranges
            .iter()
            .filter(|r| r.contains(color))
            .map(|r| r.name.clone())
            .collect()
    }

    /// Configured ranges
    #[must_use]
    pub fn ranges(&self) -> &[ColorRange] {
        &self.ranges
    }
}
