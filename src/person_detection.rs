//! Person localization using `ONNX` Runtime.
//!
//! Wraps a YOLOv8-style detector, keeping only the `person` class. Output
//! boxes are in pixel coordinates of the input frame, clipped and
//! non-maximum-suppressed, so the pipeline consumes them directly.

use crate::utils::clip_rect;
use crate::Result;
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Rect, Scalar, Size, CV_32F, CV_8UC3};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Index of the `person` class in the detector's class table
const PERSON_CLASS_INDEX: usize = 0;

/// Default detector input size when the model does not declare one
const DEFAULT_INPUT_SIZE: i32 = 640;

/// One detected person
#[derive(Debug, Clone)]
pub struct PersonDetection {
    /// Bounding box in frame pixel coordinates
    pub bbox: Rect,
    /// Confidence score of the detection
    pub score: f32,
}

impl PersonDetection {
    /// Create a detection
    #[must_use]
    pub fn new(bbox: Rect, score: f32) -> Self {
        Self { bbox, score }
    }
}

/// YOLOv8-style person detector using `ONNX` Runtime
pub struct PersonDetector {
    session: Session,
    #[allow(dead_code)] // Reserved for future named tensor support
    input_name: String,
    input_size: (i32, i32),
    conf_threshold: f32,
    nms_threshold: f32,
}

impl PersonDetector {
    /// Create a new person detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or the runtime
    /// environment cannot be created.
    pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
        log::info!(
            "Initializing PersonDetector with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("person_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| crate::error::Error::ModelInputError("Model has no inputs".to_string()))?;
        let input_name = input_meta.name.clone();

        // Input shape is [batch, channels, height, width]
        let input_shape = &input_meta.dimensions;
        let input_size = if input_shape.len() >= 4 {
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            let height = input_shape[2].unwrap_or(DEFAULT_INPUT_SIZE as u32) as i32;
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            let width = input_shape[3].unwrap_or(DEFAULT_INPUT_SIZE as u32) as i32;
            (width, height)
        } else {
            (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE)
        };

        Ok(Self {
            session,
            input_name,
            input_size,
            conf_threshold,
            nms_threshold,
        })
    }

    /// Detect persons in a frame
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for pixel coordinates
    pub fn detect(&self, image: &Mat) -> Result<Vec<PersonDetection>> {
        if image.empty() {
            return Ok(Vec::new());
        }

        let img_width = image.cols();
        let img_height = image.rows();
        let (input_width, input_height) = self.input_size;

        // Scale preserving aspect ratio, pad bottom-right with black
        let scale = (input_width as f32 / img_width as f32).min(input_height as f32 / img_height as f32);
        let new_width = ((img_width as f32 * scale) as i32).max(1);
        let new_height = ((img_height as f32 * scale) as i32).max(1);

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(new_width, new_height),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut padded = Mat::new_rows_cols_with_default(input_height, input_width, CV_8UC3, Scalar::all(0.0))?;
        for row in 0..new_height {
            for col in 0..new_width {
                *padded.at_2d_mut::<opencv::core::Vec3b>(row, col)? = *resized.at_2d::<opencv::core::Vec3b>(row, col)?;
            }
        }

        let inputs = self.preprocess(&padded)?;
        let candidates = self.forward(inputs)?;
        let kept = self.nms(candidates);

        let mut detections = Vec::with_capacity(kept.len());
        for (x1, y1, x2, y2, score) in kept {
            let rect = Rect::new(
                (x1 / scale) as i32,
                (y1 / scale) as i32,
                ((x2 - x1) / scale) as i32,
                ((y2 - y1) / scale) as i32,
            );
            if let Some(bbox) = clip_rect(rect, img_width, img_height) {
                detections.push(PersonDetection::new(bbox, score));
            }
        }

        Ok(detections)
    }

    /// Preprocess the padded image into an NCHW tensor
    #[allow(clippy::cast_sign_loss)] // OpenCV dimensions are positive
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let height = image.rows() as usize;
        let width = image.cols() as usize;
        let channels = 3;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(image, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = vec![0.0f32; height * width * channels];
        for row in 0..height {
            for col in 0..width {
                for ch in 0..channels {
                    let pixel = float_image.at_2d::<opencv::core::Vec3f>(
                        crate::utils::safe_cast::usize_to_i32(row)?,
                        crate::utils::safe_cast::usize_to_i32(col)?,
                    )?[ch];
                    data[(row * width + col) * channels + ch] = pixel;
                }
            }
        }

        let array = Array4::from_shape_vec((1, height, width, channels), data)
            .map_err(|e| crate::error::Error::ModelDataFormatError(format!("Failed to create array: {e}")))?;

        Ok(array.permuted_axes([0, 3, 1, 2]))
    }

    /// Run inference and decode person candidates as (x1, y1, x2, y2, score)
    /// in input-pixel coordinates
    fn forward(&self, inputs: Array4<f32>) -> Result<Vec<(f32, f32, f32, f32, f32)>> {
        let standard = inputs.as_standard_layout().to_owned();
        let cow_array = CowArray::from(standard.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let output = outputs
            .first()
            .ok_or_else(|| crate::error::Error::ModelOutputError("No output from model".to_string()))?;

        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[1] <= 4 {
            return Err(crate::error::Error::ModelOutputError(format!(
                "Unexpected detector output shape: {shape:?}"
            )));
        }

        let data = view
            .as_slice()
            .ok_or_else(|| crate::error::Error::ModelOutputError("Failed to get output data".to_string()))?;

        // Output layout is [1, 4 + num_classes, anchors]: rows are
        // cx, cy, w, h followed by per-class scores.
        let anchors = shape[2];
        let mut candidates = Vec::new();
        for a in 0..anchors {
            let score = data[(4 + PERSON_CLASS_INDEX) * anchors + a];
            if score < self.conf_threshold {
                continue;
            }

            let cx = data[a];
            let cy = data[anchors + a];
            let w = data[2 * anchors + a];
            let h = data[3 * anchors + a];
            candidates.push((cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0, score));
        }

        Ok(candidates)
    }

    /// Greedy non-maximum suppression
    fn nms(&self, mut candidates: Vec<(f32, f32, f32, f32, f32)>) -> Vec<(f32, f32, f32, f32, f32)> {
        candidates.sort_by(|a, b| b.4.partial_cmp(&a.4).unwrap_or(std::cmp::Ordering::Equal));

        let mut kept: Vec<(f32, f32, f32, f32, f32)> = Vec::new();
        for candidate in candidates {
            let suppressed = kept.iter().any(|k| iou(candidate, *k) > self.nms_threshold);
            if !suppressed {
                kept.push(candidate);
            }
        }

        kept
    }
}

fn iou(a: (f32, f32, f32, f32, f32), b: (f32, f32, f32, f32, f32)) -> f32 {
    let x1 = a.0.max(b.0);
    let y1 = a.1.max(b.1);
    let x2 = a.2.min(b.2);
    let y2 = a.3.min(b.3);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.2 - a.0).max(0.0) * (a.3 - a.1).max(0.0);
    let area_b = (b.2 - b.0).max(0.0) * (b.3 - b.1).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
