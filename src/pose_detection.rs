//! Whole-frame body pose extraction using `ONNX` Runtime.
//!
//! The pose model consumes the full frame and produces at most one
//! fixed-topology 33-point skeleton, frame-normalized. Its presence signal
//! doubles as the second, independent person-count input for frame fusion.

use crate::constants::NUM_POSE_LANDMARKS;
use crate::landmark_detection::LandmarkPoint;
use crate::Result;
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default pose model input size
const DEFAULT_POSE_INPUT_SIZE: i32 = 256;

/// Default presence threshold below which no skeleton is reported
const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

/// Number of values per pose landmark: x, y, z, visibility, presence
const VALUES_PER_LANDMARK: usize = 5;

/// A 33-point body skeleton, frame-normalized
#[derive(Debug, Clone, Default)]
pub struct PoseLandmarks {
    /// Ordered landmark points, normalized to the source frame
    pub points: Vec<LandmarkPoint>,
}

/// Body pose extractor using `ONNX` Runtime
pub struct PoseDetector {
    session: Session,
    #[allow(dead_code)] // Reserved for future named tensor support
    input_name: String,
    input_size: i32,
    presence_threshold: f32,
}

impl PoseDetector {
    /// Create a new pose detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or the runtime
    /// environment cannot be created.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing PoseDetector with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("pose_detector")
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
            input_size: DEFAULT_POSE_INPUT_SIZE,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
        })
    }

    /// Extract at most one skeleton from a frame
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn detect(&self, frame: &Mat) -> Result<Option<PoseLandmarks>> {
        if frame.empty() {
            return Ok(None);
        }

        let inputs = self.preprocess(frame)?;
        let (values, presence) = self.forward(inputs)?;

        if presence < self.presence_threshold {
            return Ok(None);
        }

        if values.len() < NUM_POSE_LANDMARKS * VALUES_PER_LANDMARK {
            return Err(crate::error::Error::ModelOutputError(format!(
                "Expected {} pose values, got {}",
                NUM_POSE_LANDMARKS * VALUES_PER_LANDMARK,
                values.len()
            )));
        }

        Ok(Some(self.postprocess(&values)))
    }

    /// Preprocess the frame for the model
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

        // The pose model expects NHWC input
        Array4::from_shape_vec((1, size, size, channels), data)
            .map_err(|e| crate::error::Error::ModelDataFormatError(format!("Failed to create array: {e}")))
    }

    /// Run inference; returns the raw landmark values and the presence score
    fn forward(&self, inputs: Array4<f32>) -> Result<(Vec<f32>, f32)> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let mut outputs = self.session.run(vec![input_tensor])?.into_iter();

        let landmarks_output = outputs
            .next()
            .ok_or_else(|| crate::error::Error::ModelOutputError("No output from model".to_string()))?;
        let landmarks_tensor = landmarks_output.try_extract::<f32>()?;
        let landmarks_view = landmarks_tensor.view();
        let values = landmarks_view
            .as_slice()
            .ok_or_else(|| crate::error::Error::ModelOutputError("Failed to get output data".to_string()))?
            .to_vec();

        // Second output, when present, is the person presence logit
        let presence = match outputs.next() {
            Some(score_output) => {
                let score_tensor = score_output.try_extract::<f32>()?;
                let score_view = score_tensor.view();
                let logit = score_view.iter().next().copied().unwrap_or(0.0);
                1.0 / (1.0 + (-logit).exp())
            }
            None => 1.0,
        };

        Ok((values, presence))
    }

    /// Convert model output to normalized landmark points
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for pixel coordinates
    fn postprocess(&self, values: &[f32]) -> PoseLandmarks {
        let scale = self.input_size as f32;
        let mut points = Vec::with_capacity(NUM_POSE_LANDMARKS);

        for chunk in values.chunks_exact(VALUES_PER_LANDMARK).take(NUM_POSE_LANDMARKS) {
            points.push(LandmarkPoint::new(chunk[0] / scale, chunk[1] / scale, chunk[2] / scale));
        }

        PoseLandmarks { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_topology() {
        assert_eq!(NUM_POSE_LANDMARKS, 33);
        assert_eq!(NUM_POSE_LANDMARKS * VALUES_PER_LANDMARK, 165);
    }
}
