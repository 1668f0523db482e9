//! Dominant color extraction from image regions.
//!
//! Reduces a body region to its single most representative HSV color with
//! K-means clustering, which tolerates noisy pixels (shadows, highlights,
//! background bleed) better than a plain average. Cluster initialization is
//! random, so bit-exact reproducibility across runs requires fixing the
//! `OpenCV` RNG seed externally.

use crate::constants::{DOMINANT_COLOR_CLUSTERS, KMEANS_ATTEMPTS, KMEANS_EPSILON, KMEANS_MAX_ITERATIONS};
use crate::Result;
use opencv::core::{self, Mat, TermCriteria, TermCriteria_Type, CV_32F};
use opencv::imgproc;
use opencv::prelude::*;

/// Extract the dominant HSV color of a BGR image region.
///
/// An empty region returns the `(0, 0, 0)` sentinel. Regions with fewer
/// pixels than the cluster count fall back to the per-channel mean, the
/// degenerate-cluster limit.
///
/// # Errors
///
/// Returns an error if color conversion or clustering fails.
pub fn dominant_hsv(region: &Mat) -> Result<(u8, u8, u8)> {
    if region.empty() || region.rows() == 0 || region.cols() == 0 {
        return Ok((0, 0, 0));
    }

    let mut hsv = Mat::default();
    imgproc::cvt_color(region, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;

    let total = hsv.rows() * hsv.cols();
    if total < DOMINANT_COLOR_CLUSTERS {
        let mean = core::mean(&hsv, &Mat::default())?;
        return Ok((round_channel(mean[0]), round_channel(mean[1]), round_channel(mean[2])));
    }

    // Flatten to an N x 3 single-channel f32 sample matrix
    let mut samples_f32 = Mat::default();
    hsv.convert_to(&mut samples_f32, CV_32F, 1.0, 0.0)?;
    let samples = samples_f32.reshape(1, total)?.try_clone()?;

    let criteria = TermCriteria::new(
        TermCriteria_Type::COUNT as i32 + TermCriteria_Type::EPS as i32,
        KMEANS_MAX_ITERATIONS,
        KMEANS_EPSILON,
    )?;

    let mut labels = Mat::default();
    let mut centers = Mat::default();
    core::kmeans(
        &samples,
        DOMINANT_COLOR_CLUSTERS,
        &mut labels,
        criteria,
        KMEANS_ATTEMPTS,
        core::KMEANS_RANDOM_CENTERS,
        &mut centers,
    )?;

    // The most-populated cluster's centroid is the dominant color
    #[allow(clippy::cast_sign_loss)] // cluster count is a small positive constant
    let mut counts = vec![0usize; DOMINANT_COLOR_CLUSTERS as usize];
    for i in 0..labels.rows() {
        let label = *labels.at::<i32>(i)?;
        if let Some(count) = counts.get_mut(label as usize) {
            *count += 1;
        }
    }

    let dominant = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, &count)| count)
        .map_or(0, |(idx, _)| idx);

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let row = dominant as i32;
    let h = *centers.at_2d::<f32>(row, 0)?;
    let s = *centers.at_2d::<f32>(row, 1)?;
    let v = *centers.at_2d::<f32>(row, 2)?;

    Ok((round_channel(f64::from(h)), round_channel(f64::from(s)), round_channel(f64::from(v))))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to channel range
fn round_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn solid_bgr(rows: i32, cols: i32, b: f64, g: f64, r: f64) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::new(b, g, r, 0.0))
            .expect("failed to create test image")
    }

    #[test]
    fn test_empty_region_returns_sentinel() {
        let region = Mat::default();
        assert_eq!(dominant_hsv(&region).unwrap(), (0, 0, 0));
    }

    #[test]
    fn test_uniform_green_region() {
        // BGR (0, 255, 0) is HSV (60, 255, 255)
        let region = solid_bgr(20, 20, 0.0, 255.0, 0.0);
        assert_eq!(dominant_hsv(&region).unwrap(), (60, 255, 255));
    }

    #[test]
    fn test_uniform_black_region() {
        let region = solid_bgr(8, 8, 0.0, 0.0, 0.0);
        assert_eq!(dominant_hsv(&region).unwrap(), (0, 0, 0));
    }

    #[test]
    fn test_tiny_region_uses_mean() {
        // 1x2 region has fewer samples than the cluster count
        let region = solid_bgr(1, 2, 255.0, 0.0, 0.0);
        // BGR blue is HSV (120, 255, 255)
        assert_eq!(dominant_hsv(&region).unwrap(), (120, 255, 255));
    }

    #[test]
    fn test_majority_color_dominates() {
        // 3/4 green, 1/4 red: the green cluster has the most samples
        let mut region = solid_bgr(20, 20, 0.0, 255.0, 0.0);
        for row in 0..5 {
            for col in 0..20 {
                *region.at_2d_mut::<opencv::core::Vec3b>(row, col).expect("pixel") =
                    opencv::core::Vec3b::from([0, 0, 255]);
            }
        }

        let (h, s, v) = dominant_hsv(&region).unwrap();
        assert_eq!((h, s, v), (60, 255, 255));
    }
}
