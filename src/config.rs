//! Configuration management for the vigil application

use crate::compliance::ColorRange;
use crate::constants::{
    DEFAULT_BOX_EXPANSION, DEFAULT_CAPTURE_INTERVAL_SECS, DEFAULT_CAPTURE_LIMIT, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Person detection configuration
    pub detection: DetectionConfig,

    /// Identity recognition configuration
    pub recognition: RecognitionConfig,

    /// Evidence capture configuration
    pub capture: CaptureConfig,

    /// Attire color compliance configuration
    pub compliance: ComplianceConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to person detection ONNX model
    pub person_detector: PathBuf,

    /// Path to face mesh ONNX model
    pub face_landmarks: PathBuf,

    /// Path to body pose ONNX model
    pub body_pose: PathBuf,
}

/// Person detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Confidence threshold for person detection (0.0-1.0)
    pub confidence_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,

    /// Expansion factor applied to person boxes before face search
    pub box_expansion: f32,
}

/// Identity recognition parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Cosine similarity threshold for a positive identity match
    pub similarity_threshold: f32,

    /// Path to the persisted identity store
    pub store_path: PathBuf,
}

/// Evidence capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum evidence captures per unknown face fingerprint
    pub capture_limit: u32,

    /// Minimum seconds between captures of the same fingerprint
    pub min_interval_secs: f64,

    /// Directory evidence images are written into
    pub evidence_dir: PathBuf,
}

/// Attire color compliance parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Named allowed HSV ranges; colors outside every range raise an alert
    pub allowed_ranges: Vec<ColorRange>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            detection: DetectionConfig::default(),
            recognition: RecognitionConfig::default(),
            capture: CaptureConfig::default(),
            compliance: ComplianceConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            person_detector: PathBuf::from("assets/person_detector.onnx"),
            face_landmarks: PathBuf::from("assets/face_mesh.onnx"),
            body_pose: PathBuf::from("assets/body_pose.onnx"),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            box_expansion: DEFAULT_BOX_EXPANSION,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            store_path: PathBuf::from("identities.json"),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            min_interval_secs: DEFAULT_CAPTURE_INTERVAL_SECS,
            evidence_dir: PathBuf::from("evidence"),
        }
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            allowed_ranges: vec![
                ColorRange::new("navy", [100, 80, 20], [130, 255, 180]),
                ColorRange::new("white", [0, 0, 180], [179, 40, 255]),
                ColorRange::new("hi_vis_yellow", [22, 120, 120], [38, 255, 255]),
            ],
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.iou_threshold) {
            return Err(Error::ConfigError(
                "IOU threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detection.box_expansion < 1.0 {
            return Err(Error::ConfigError(
                "Box expansion factor must be at least 1.0".to_string(),
            ));
        }

        if self.recognition.similarity_threshold <= 0.0 || self.recognition.similarity_threshold > 1.0 {
            return Err(Error::ConfigError(
                "Similarity threshold must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.capture.min_interval_secs < 0.0 {
            return Err(Error::ConfigError(
                "Capture interval must not be negative".to_string(),
            ));
        }

        if self.compliance.allowed_ranges.is_empty() {
            return Err(Error::ConfigError(
                "At least one allowed color range must be configured".to_string(),
            ));
        }
        for range in &self.compliance.allowed_ranges {
            for i in 0..3 {
                if range.lower[i] > range.upper[i] {
                    return Err(Error::ConfigError(format!(
                        "Color range '{}' has lower bound above upper bound on channel {}",
                        range.name, i
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Vigil Configuration

# Model paths
models:
  person_detector: "assets/person_detector.onnx"
  face_landmarks: "assets/face_mesh.onnx"
  body_pose: "assets/body_pose.onnx"

# Person detection parameters
detection:
  confidence_threshold: 0.5
  iou_threshold: 0.45
  box_expansion: 1.2

# Identity recognition
recognition:
  similarity_threshold: 0.75
  store_path: "identities.json"

# Evidence capture
capture:
  capture_limit: 3
  min_interval_secs: 2.0
  evidence_dir: "evidence"

# Approved attire colors (HSV, OpenCV ranges: H 0-179, S/V 0-255)
compliance:
  allowed_ranges:
    - name: "navy"
      lower: [100, 80, 20]
      upper: [130, 255, 180]
    - name: "white"
      lower: [0, 0, 180]
      upper: [179, 40, 255]
    - name: "hi_vis_yellow"
      lower: [22, 120, 120]
      upper: [38, 255, 255]
"#;
