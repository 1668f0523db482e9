//! Main application module for stream monitoring.

use crate::{
    config::Config,
    error::Result,
    evidence::FileEvidenceSink,
    identity::IdentityStore,
    landmark_detection::{DisabledLandmarkSource, FaceLandmarkSource, FaceMeshExtractor},
    person_detection::PersonDetector,
    pipeline::{DetectionPipeline, FrameDetectionResult},
    pose_detection::PoseDetector,
    recognition::RecognitionEngine,
    throttle::CaptureThrottler,
};
use log::{debug, info, warn};
use opencv::{
    core::{Mat, Point, Scalar},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
};
use std::path::PathBuf;
use std::time::Duration;

/// Video source type
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(String),
}

/// Main application struct
pub struct MonitorApp {
    video_source: VideoSource,
    display: bool,
    person_detector: Option<PersonDetector>,
    pose_detector: Option<PoseDetector>,
    pipeline: DetectionPipeline,
    video_capture: VideoCapture,
    store_path: PathBuf,
}

impl MonitorApp {
    /// Create a new monitoring application.
    ///
    /// Detectors that fail to initialize are disabled with a warning rather
    /// than aborting: the affected capability reports empty results for the
    /// rest of the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the video source or the evidence directory cannot
    /// be opened.
    pub fn new(video_source: VideoSource, display: bool, config: &Config) -> Result<Self> {
        info!("Initializing vigil monitoring application");

        let video_capture = match &video_source {
            VideoSource::Camera(index) => {
                info!("Opening camera {}", index);
                let mut cap = VideoCapture::new(*index, videoio::CAP_ANY)?;
                cap.set(CAP_PROP_BUFFERSIZE, 1.0)?;
                cap
            }
            VideoSource::File(path) => {
                info!("Opening video file: {}", path);
                VideoCapture::from_file(path, videoio::CAP_ANY)?
            }
        };

        let person_detector = match PersonDetector::new(
            &config.models.person_detector,
            config.detection.confidence_threshold,
            config.detection.iou_threshold,
        ) {
            Ok(detector) => Some(detector),
            Err(e) => {
                warn!("Person detector unavailable: {e}. Person localization disabled for this run.");
                None
            }
        };

        let pose_detector = match PoseDetector::new(&config.models.body_pose) {
            Ok(detector) => Some(detector),
            Err(e) => {
                warn!("Pose detector unavailable: {e}. Pose estimation disabled for this run.");
                None
            }
        };

        let landmark_source: Box<dyn FaceLandmarkSource> = match FaceMeshExtractor::new(&config.models.face_landmarks)
        {
            Ok(extractor) => Box::new(extractor),
            Err(e) => {
                warn!("Face mesh unavailable: {e}. Face recognition disabled for this run.");
                Box::new(DisabledLandmarkSource)
            }
        };

        let store = IdentityStore::load(&config.recognition.store_path);
        let evidence = Box::new(FileEvidenceSink::new(&config.capture.evidence_dir)?);

        let pipeline = DetectionPipeline::new(
            landmark_source,
            evidence,
            store,
            RecognitionEngine::new(config.recognition.similarity_threshold),
            CaptureThrottler::new(
                config.capture.capture_limit,
                Duration::from_secs_f64(config.capture.min_interval_secs),
            ),
            crate::compliance::ComplianceClassifier::new(config.compliance.allowed_ranges.clone()),
            config.detection.box_expansion,
        );

        if display {
            highgui::named_window("Vigil", WINDOW_NORMAL)?;
        }

        Ok(Self {
            video_source,
            display,
            person_detector,
            pose_detector,
            pipeline,
            video_capture,
            store_path: config.recognition.store_path.clone(),
        })
    }

    /// Run the main application loop.
    ///
    /// # Errors
    ///
    /// Returns an error if frame processing fails or if the identity store
    /// cannot be written at shutdown — enrollment data loss is surfaced, not
    /// swallowed.
    pub fn run(&mut self) -> Result<()> {
        info!("Starting main monitoring loop");

        let mut frame_count: u64 = 0;
        loop {
            let mut frame = Mat::default();
            if !self.video_capture.read(&mut frame)? || frame.empty() {
                if matches!(self.video_source, VideoSource::File(_)) {
                    info!("End of video file reached");
                    break;
                }
                warn!("Failed to read frame, retrying...");
                continue;
            }

            let persons = match &self.person_detector {
                Some(detector) => detector.detect(&frame).unwrap_or_else(|e| {
                    warn!("Person detection failed: {e}");
                    Vec::new()
                }),
                None => Vec::new(),
            };

            let pose = match &self.pose_detector {
                Some(detector) => detector.detect(&frame).unwrap_or_else(|e| {
                    warn!("Pose detection failed: {e}");
                    None
                }),
                None => None,
            };

            let result = self.pipeline.process_frame(&frame, &persons, pose)?;

            frame_count += 1;
            debug!(
                "Frame {}: {} humans, {} faces, color_excluded={}",
                frame_count,
                result.human_count,
                result.faces.len(),
                result.color_excluded
            );

            if self.display {
                let mut annotated = frame.clone();
                self.draw_results(&mut annotated, &result)?;
                highgui::imshow("Vigil", &annotated)?;

                let key = highgui::wait_key(1)?;
                if key == 27 || key == i32::from(b'q') {
                    info!("Exit requested by user");
                    break;
                }
            }
        }

        info!("Shutting down, saving identity store");
        self.pipeline.store().save(&self.store_path)?;

        Ok(())
    }

    /// Draw per-frame results onto the display frame
    fn draw_results(&self, frame: &mut Mat, result: &FrameDetectionResult) -> Result<()> {
        for face in &result.faces {
            let color = if face.identity.is_some() {
                Scalar::new(0.0, 255.0, 0.0, 0.0)
            } else {
                Scalar::new(0.0, 0.0, 255.0, 0.0)
            };
            imgproc::rectangle(frame, face.bbox, color, 2, LINE_8, 0)?;

            let label = match &face.identity {
                Some(id) => format!("{} ({:.2})", id, face.score),
                None => "unknown".to_string(),
            };
            imgproc::put_text(
                frame,
                &label,
                Point::new(face.bbox.x, (face.bbox.y - 6).max(12)),
                FONT_HERSHEY_SIMPLEX,
                0.5,
                color,
                1,
                LINE_8,
                false,
            )?;
        }

        let mut status = format!("humans: {}", result.human_count);
        if result.color_excluded {
            status.push_str("  ATTIRE ALERT");
        } else if !result.matched_categories.is_empty() {
            status.push_str(&format!("  attire: {}", result.matched_categories.join(", ")));
        }

        let status_color = if result.color_excluded {
            Scalar::new(0.0, 0.0, 255.0, 0.0)
        } else {
            Scalar::new(255.0, 255.0, 255.0, 0.0)
        };
        imgproc::put_text(
            frame,
            &status,
            Point::new(10, 24),
            FONT_HERSHEY_SIMPLEX,
            0.7,
            status_color,
            2,
            LINE_8,
            false,
        )?;

        Ok(())
    }
}
