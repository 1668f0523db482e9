//! Facial landmark extraction using `ONNX` Runtime.
//!
//! The face mesh model consumes a face crop and produces a fixed-topology
//! ordered set of 468 landmarks. Coordinates are normalized to the image the
//! extractor was given; the pipeline remaps them to full-frame space before
//! any signature math.

use crate::constants::NUM_FACE_MESH_LANDMARKS;
use crate::Result;
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default face mesh model input size
const DEFAULT_MESH_INPUT_SIZE: i32 = 192;

/// Default face presence threshold below which a crop yields no landmarks
const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

/// One 3D landmark in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkPoint {
    /// Horizontal position in [0, 1] relative to the source image
    pub x: f32,
    /// Vertical position in [0, 1] relative to the source image
    pub y: f32,
    /// Depth relative to the face plane, same scale as x
    pub z: f32,
}

impl LandmarkPoint {
    /// Create a landmark point
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A fixed-topology ordered landmark set for one face
#[derive(Debug, Clone, Default)]
pub struct FaceLandmarks {
    /// Ordered landmark points, normalized to the source image
    pub points: Vec<LandmarkPoint>,
}

/// Source of facial landmarks for an image crop.
///
/// The trait seam keeps the pipeline testable with stub geometry and lets
/// the application swap in a disabled source when the model is unavailable.
pub trait FaceLandmarkSource {
    /// Extract zero or more landmark sets from an image.
    ///
    /// Every returned set uses the same topology, with coordinates
    /// normalized to the given image.
    fn extract(&self, image: &Mat) -> Result<Vec<FaceLandmarks>>;
}

/// Stand-in landmark source used when the face mesh model failed to
/// initialize: always reports no faces, keeping the pipeline running.
#[derive(Debug, Default)]
pub struct DisabledLandmarkSource;

impl FaceLandmarkSource for DisabledLandmarkSource {
    fn extract(&self, _image: &Mat) -> Result<Vec<FaceLandmarks>> {
        Ok(Vec::new())
    }
}

/// Face mesh landmark extractor using `ONNX` Runtime
pub struct FaceMeshExtractor {
    session: Session,
    #[allow(dead_code)] // Reserved for future named tensor support
    input_name: String,
    input_size: i32,
    presence_threshold: f32,
}

impl FaceMeshExtractor {
    /// Create a new extractor from an `ONNX` face mesh model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing FaceMeshExtractor with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_mesh")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .ok_or_else(|| crate::error::Error::ModelInputError("Model has no inputs".to_string()))?
            .name
            .clone();

        Ok(Self {
            session,
            input_name,
            input_size: DEFAULT_MESH_INPUT_SIZE,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
        })
    }

    /// Preprocess a crop for the model
    #[allow(clippy::cast_sign_loss)] // OpenCV dimensions are positive
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let size = self.input_size as usize;
        let channels = 3;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = vec![0.0f32; size * size * channels];
        for row in 0..size {
            for col in 0..size {
                for ch in 0..channels {
                    let pixel = float_image.at_2d::<opencv::core::Vec3f>(
                        crate::utils::safe_cast::usize_to_i32(row)?,
                        crate::utils::safe_cast::usize_to_i32(col)?,
                    )?[ch];
                    data[(row * size + col) * channels + ch] = pixel;
                }
            }
        }

        // The face mesh model expects NHWC input
        Array4::from_shape_vec((1, size, size, channels), data)
            .map_err(|e| crate::error::Error::ModelDataFormatError(format!("Failed to create array: {e}")))
    }

    /// Run inference; returns the landmark tensor and the presence score
    fn forward(&self, inputs: Array4<f32>) -> Result<(Vec<f32>, f32)> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let mut outputs = self.session.run(vec![input_tensor])?.into_iter();

        let marks_output = outputs
            .next()
            .ok_or_else(|| crate::error::Error::ModelOutputError("No output from model".to_string()))?;
        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        let marks = marks_view
            .as_slice()
            .ok_or_else(|| crate::error::Error::ModelOutputError("Failed to get output data".to_string()))?
            .to_vec();

        // Second output, when present, is the face presence logit
        let presence = match outputs.next() {
            Some(score_output) => {
                let score_tensor = score_output.try_extract::<f32>()?;
                let score_view = score_tensor.view();
                let logit = score_view.iter().next().copied().unwrap_or(0.0);
                1.0 / (1.0 + (-logit).exp())
            }
            None => 1.0,
        };

        Ok((marks, presence))
    }

    /// Convert model output to normalized landmark points
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for pixel coordinates
    fn postprocess(&self, marks: &[f32]) -> FaceLandmarks {
        let scale = self.input_size as f32;
        let mut points = Vec::with_capacity(NUM_FACE_MESH_LANDMARKS);

        for chunk in marks.chunks_exact(3).take(NUM_FACE_MESH_LANDMARKS) {
            points.push(LandmarkPoint::new(chunk[0] / scale, chunk[1] / scale, chunk[2] / scale));
        }

        FaceLandmarks { points }
    }
}

impl FaceLandmarkSource for FaceMeshExtractor {
    fn extract(&self, image: &Mat) -> Result<Vec<FaceLandmarks>> {
        if image.empty() {
            return Ok(Vec::new());
        }

        let inputs = self.preprocess(image)?;
        let (marks, presence) = self.forward(inputs)?;

        if presence < self.presence_threshold {
            return Ok(Vec::new());
        }

        if marks.len() < NUM_FACE_MESH_LANDMARKS * 3 {
            return Err(crate::error::Error::ModelOutputError(format!(
                "Expected {} landmark values, got {}",
                NUM_FACE_MESH_LANDMARKS * 3,
                marks.len()
            )));
        }

        Ok(vec![self.postprocess(&marks)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_topology() {
        assert_eq!(NUM_FACE_MESH_LANDMARKS, 468);
        assert_eq!(DEFAULT_MESH_INPUT_SIZE, 192);
    }

    #[test]
    fn test_disabled_source_reports_no_faces() {
        let source = DisabledLandmarkSource;
        let image = Mat::default();
        assert!(source.extract(&image).unwrap().is_empty());
    }
}
