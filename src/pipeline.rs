//! Per-frame detection pipeline.
//!
//! Orchestrates one frame's worth of work: face landmark extraction inside
//! expanded person boxes, signature recognition, throttled evidence capture
//! for unknown faces, attire color compliance on body regions, and fusion of
//! the two independent person-presence signals.
//!
//! The pipeline draws nothing and performs no I/O beyond the evidence sink.

use crate::compliance::ComplianceClassifier;
use crate::dominant_color::dominant_hsv;
use crate::evidence::EvidenceSink;
use crate::identity::IdentityStore;
use crate::landmark_detection::{FaceLandmarkSource, FaceLandmarks, LandmarkPoint};
use crate::person_detection::PersonDetection;
use crate::pose_detection::PoseLandmarks;
use crate::recognition::RecognitionEngine;
use crate::signature::FaceSignature;
use crate::throttle::CaptureThrottler;
use crate::utils::{clip_rect, expand_rect, lower_half};
use crate::Result;
use log::{debug, warn};
use opencv::core::{Mat, Point, Rect, Vector};
use opencv::imgproc;
use opencv::prelude::*;

/// Evidence reason tag for an unrecognized face
pub const REASON_UNKNOWN_FACE: &str = "unknown_face";

/// Evidence reason tag for a non-compliant attire color
pub const REASON_DISALLOWED_COLOR: &str = "disallowed_color";

/// Outcome for one detected face
#[derive(Debug, Clone)]
pub struct FaceObservation {
    /// Person box the face was found in, frame pixel coordinates
    pub bbox: Rect,
    /// Landmarks remapped to full-frame normalized space
    pub landmarks: FaceLandmarks,
    /// Recognized identity, if any record exceeded the threshold
    pub identity: Option<String>,
    /// Similarity score of the recognized identity, 0.0 when unrecognized
    pub score: f32,
    /// Whether an evidence capture was taken for this face
    pub captured: bool,
}

/// Aggregate result of processing one frame
#[derive(Debug, Default)]
pub struct FrameDetectionResult {
    /// Per-face outcomes across all person boxes
    pub faces: Vec<FaceObservation>,
    /// Fused person count: max of the box count and pose presence
    pub human_count: usize,
    /// True when any checked region wore a disallowed color
    pub color_excluded: bool,
    /// Allowed categories matched by the pose-derived lower-body region
    pub matched_categories: Vec<String>,
    /// The raw skeleton, passed through for downstream drawing
    pub pose: Option<PoseLandmarks>,
}

/// Per-frame orchestrator over the recognition and compliance components
pub struct DetectionPipeline {
    landmark_source: Box<dyn FaceLandmarkSource>,
    evidence: Box<dyn EvidenceSink>,
    store: IdentityStore,
    recognizer: RecognitionEngine,
    throttler: CaptureThrottler,
    classifier: ComplianceClassifier,
    box_expansion: f32,
}

impl DetectionPipeline {
    /// Assemble a pipeline from its components
    #[must_use]
    pub fn new(
        landmark_source: Box<dyn FaceLandmarkSource>,
        evidence: Box<dyn EvidenceSink>,
        store: IdentityStore,
        recognizer: RecognitionEngine,
        throttler: CaptureThrottler,
        classifier: ComplianceClassifier,
        box_expansion: f32,
    ) -> Self {
        Self {
            landmark_source,
            evidence,
            store,
            recognizer,
            throttler,
            classifier,
            box_expansion,
        }
    }

    /// The identity store, for persistence at shutdown
    #[must_use]
    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    /// Process one frame.
    ///
    /// `persons` and `pose` come from the external detectors; face landmarks
    /// are extracted here because they operate on per-box crops.
    ///
    /// # Errors
    ///
    /// Returns an error if a crop, color conversion, landmark extraction or
    /// evidence capture fails.
    pub fn process_frame(
        &mut self,
        frame: &Mat,
        persons: &[PersonDetection],
        pose: Option<PoseLandmarks>,
    ) -> Result<FrameDetectionResult> {
        let width = frame.cols();
        let height = frame.rows();

        let mut faces = Vec::new();
        let mut color_excluded = false;

        for person in persons {
            let Some(clipped) = clip_rect(person.bbox, width, height) else {
                continue;
            };

            // Faces are searched in a widened crop so a head at the box edge
            // is not cut off.
            if let Some(expanded) = expand_rect(clipped, self.box_expansion, width, height) {
                let crop = Mat::roi(frame, expanded)?.try_clone()?;
                for face in self.landmark_source.extract(&crop)? {
                    let remapped = remap_to_frame(&face, expanded, width, height);
                    let observation = self.process_face(frame, clipped, remapped)?;
                    faces.push(observation);
                }
            }

            // Attire check runs on the lower half of the ORIGINAL box; the
            // widened crop would pull in background.
            if let Some(torso) = clip_rect(lower_half(clipped), width, height) {
                let region = Mat::roi(frame, torso)?.try_clone()?;
                let color = dominant_hsv(&region)?;
                if !self.classifier.is_allowed(color) {
                    warn!("Disallowed attire color {color:?} in person box at ({}, {})", clipped.x, clipped.y);
                    color_excluded = true;
                    self.evidence.capture(frame, REASON_DISALLOWED_COLOR)?;
                }
            }
        }

        // Frame-level compliance over the pose skeleton's lower body
        let mut matched_categories = Vec::new();
        if let Some(skeleton) = &pose {
            if let Some(region_rect) = lower_body_region(skeleton, width, height)? {
                let region = Mat::roi(frame, region_rect)?.try_clone()?;
                let color = dominant_hsv(&region)?;
                matched_categories = self.classifier.matching_categories(color);
                if !self.classifier.is_allowed(color) {
                    warn!("Disallowed attire color {color:?} in pose lower-body region");
                    color_excluded = true;
                    self.evidence.capture(frame, REASON_DISALLOWED_COLOR)?;
                }
            }
        }

        // Optimistic fusion: either detector finding a person is sufficient
        let human_count = persons.len().max(usize::from(pose.is_some()));

        Ok(FrameDetectionResult {
            faces,
            human_count,
            color_excluded,
            matched_categories,
            pose,
        })
    }

    /// Recognize one face and decide on evidence capture
    fn process_face(&mut self, frame: &Mat, bbox: Rect, landmarks: FaceLandmarks) -> Result<FaceObservation> {
        let signature = FaceSignature::from_landmarks(&landmarks.points);
        let (identity, score) = self.recognizer.recognize(&self.store, &signature);

        let mut captured = false;
        if identity.is_none() {
            if self.throttler.should_capture(signature.fingerprint()) {
                debug!("Capturing evidence for unknown face (fingerprint {:016x})", signature.fingerprint());
                captured = true;
                self.evidence.capture(frame, REASON_UNKNOWN_FACE)?;
            }
        } else {
            debug!("Face recognized as {:?} (score {:.3})", identity, score);
        }

        Ok(FaceObservation {
            bbox,
            landmarks,
            identity,
            score,
            captured,
        })
    }
}

/// Remap crop-local normalized landmarks into full-frame normalized space.
///
/// All downstream signature math assumes full-frame coordinates; feeding it
/// crop-local ones would make signatures depend on where the person stood.
#[allow(clippy::cast_precision_loss)] // pixel coordinates are far below f32 precision limits
fn remap_to_frame(face: &FaceLandmarks, crop: Rect, frame_width: i32, frame_height: i32) -> FaceLandmarks {
    let crop_x = crop.x as f32;
    let crop_y = crop.y as f32;
    let crop_w = crop.width as f32;
    let crop_h = crop.height as f32;
    let frame_w = frame_width as f32;
    let frame_h = frame_height as f32;

    let points = face
        .points
        .iter()
        .map(|p| {
            LandmarkPoint::new(
                (crop_x + p.x * crop_w) / frame_w,
                (crop_y + p.y * crop_h) / frame_h,
                // Depth follows the horizontal scale change
                p.z * crop_w / frame_w,
            )
        })
        .collect();

    FaceLandmarks { points }
}

/// Bounding rectangle of the convex hull of the skeleton's lower-body
/// landmarks, projected to frame pixels. `None` when too few points remain
/// to form a region.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)] // pixel projection
fn lower_body_region(skeleton: &PoseLandmarks, width: i32, height: i32) -> Result<Option<Rect>> {
    let mut points: Vector<Point> = Vector::new();
    for p in skeleton.points.iter().skip(crate::constants::POSE_LOWER_BODY_START) {
        let x = (p.x * width as f32) as i32;
        let y = (p.y * height as f32) as i32;
        points.push(Point::new(x, y));
    }

    if points.len() < 3 {
        return Ok(None);
    }

    let mut hull: Vector<Point> = Vector::new();
    imgproc::convex_hull(&points, &mut hull, false, true)?;
    let rect = imgproc::bounding_rect(&hull)?;

    Ok(clip_rect(rect, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_centers() {
        let face = FaceLandmarks {
            points: vec![LandmarkPoint::new(0.5, 0.5, 0.1)],
        };
        let crop = Rect::new(80, 60, 240, 420);
        let remapped = remap_to_frame(&face, crop, 640, 480);

        let p = remapped.points[0];
        assert!((p.x - (80.0 + 120.0) / 640.0).abs() < 1e-6);
        assert!((p.y - (60.0 + 210.0) / 480.0).abs() < 1e-6);
        assert!((p.z - 0.1 * 240.0 / 640.0).abs() < 1e-6);
    }

    #[test]
    fn test_remap_stays_in_unit_range_for_contained_crop() {
        let face = FaceLandmarks {
            points: vec![
                LandmarkPoint::new(0.0, 0.0, 0.0),
                LandmarkPoint::new(1.0, 1.0, 0.0),
            ],
        };
        let crop = Rect::new(100, 100, 200, 300);
        let remapped = remap_to_frame(&face, crop, 640, 480);

        for p in &remapped.points {
            assert!((0.0..=1.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
        }
    }

    #[test]
    fn test_lower_body_region_needs_points() {
        let skeleton = PoseLandmarks { points: Vec::new() };
        assert!(lower_body_region(&skeleton, 640, 480).unwrap().is_none());
    }

    #[test]
    fn test_lower_body_region_bounds_hull() {
        // 33 points; the lower-body tail spans a known rectangle
        let mut points = vec![LandmarkPoint::new(0.5, 0.2, 0.0); crate::constants::POSE_LOWER_BODY_START];
        points.push(LandmarkPoint::new(0.25, 0.5, 0.0));
        points.push(LandmarkPoint::new(0.75, 0.5, 0.0));
        points.push(LandmarkPoint::new(0.25, 0.9, 0.0));
        points.push(LandmarkPoint::new(0.75, 0.9, 0.0));
        let skeleton = PoseLandmarks { points };

        let rect = lower_body_region(&skeleton, 640, 480).unwrap().unwrap();
        assert_eq!(rect.x, 160);
        assert_eq!(rect.y, 240);
        // bounding_rect is inclusive of the hull's extreme pixels
        assert!(rect.width >= 320 && rect.width <= 321);
        assert!(rect.height >= 192 && rect.height <= 193);
    }
}
