//! Identity recognition and attire color compliance for video streams.
//!
//! This library watches a video stream for two things:
//! - faces whose geometric signature is not in the enrolled identity store,
//!   captured as evidence under a rate limit
//! - attire colors outside an approved palette, flagged and captured
//!
//! The per-frame flow:
//! 1. An external person detector supplies bounding boxes
//! 2. Face landmarks are extracted inside each (expanded) box and remapped
//!    to full-frame coordinates
//! 3. Each face's signature is matched against the identity store; unknown
//!    faces go through the capture throttler
//! 4. The dominant color of each person's lower body is tested against the
//!    configured compliance ranges
//! 5. A whole-frame pose skeleton provides a second, independent person
//!    count and lower-body region; the two signals fuse optimistically
//!
//! # Examples
//!
//! ```no_run
//! use vigil::config::Config;
//! use vigil::evidence::FileEvidenceSink;
//! use vigil::identity::IdentityStore;
//! use vigil::landmark_detection::FaceMeshExtractor;
//! use vigil::person_detection::PersonDetector;
//! use vigil::pipeline::DetectionPipeline;
//! use vigil::recognition::RecognitionEngine;
//! use vigil::throttle::CaptureThrottler;
//! use vigil::compliance::ComplianceClassifier;
//! use opencv::imgcodecs;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//!
//! let person_detector = PersonDetector::new("assets/person_detector.onnx", 0.5, 0.45)?;
//! let landmark_source = Box::new(FaceMeshExtractor::new("assets/face_mesh.onnx")?);
//! let evidence = Box::new(FileEvidenceSink::new("evidence")?);
//! let store = IdentityStore::load("identities.json");
//!
//! let mut pipeline = DetectionPipeline::new(
//!     landmark_source,
//!     evidence,
//!     store,
//!     RecognitionEngine::new(0.75),
//!     CaptureThrottler::new(3, Duration::from_secs_f64(2.0)),
//!     ComplianceClassifier::new(config.compliance.allowed_ranges.clone()),
//!     config.detection.box_expansion,
//! );
//!
//! let frame = imgcodecs::imread("frame.jpg", imgcodecs::IMREAD_COLOR)?;
//! let persons = person_detector.detect(&frame)?;
//! let result = pipeline.process_frame(&frame, &persons, None)?;
//!
//! for face in &result.faces {
//!     match &face.identity {
//!         Some(id) => println!("recognized {} ({:.2})", id, face.score),
//!         None => println!("unknown face, captured: {}", face.captured),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod compliance;
pub mod config;
pub mod constants;
pub mod dominant_color;
pub mod error;
pub mod evidence;
pub mod identity;
pub mod landmark_detection;
pub mod person_detection;
pub mod pipeline;
pub mod pose_detection;
pub mod recognition;
pub mod signature;
pub mod throttle;
pub mod utils;

pub use error::{Error, Result};
