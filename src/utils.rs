//! Geometry helpers for bounding-box handling.

pub mod safe_cast;

use opencv::core::Rect;
use safe_cast::f32_to_i32_clamp;

/// Clip a box to image bounds.
///
/// Returns `None` when nothing remains after clipping — callers skip
/// zero-area boxes instead of processing empty crops.
#[must_use]
pub fn clip_rect(rect: Rect, width: i32, height: i32) -> Option<Rect> {
    let x1 = rect.x.max(0);
    let y1 = rect.y.max(0);
    let x2 = (rect.x + rect.width).min(width);
    let y2 = (rect.y + rect.height).min(height);

    if x2 <= x1 || y2 <= y1 {
        None
    } else {
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// Expand a box about its center by `factor`, reclipped to image bounds.
///
/// Used to widen person boxes before face search so small faces near the
/// box edge are not cut off.
#[must_use]
#[allow(clippy::cast_precision_loss)] // pixel coordinates are far below f32 precision limits
pub fn expand_rect(rect: Rect, factor: f32, width: i32, height: i32) -> Option<Rect> {
    let center_x = rect.x as f32 + rect.width as f32 / 2.0;
    let center_y = rect.y as f32 + rect.height as f32 / 2.0;
    let new_width = rect.width as f32 * factor;
    let new_height = rect.height as f32 * factor;

    let expanded = Rect::new(
        f32_to_i32_clamp(center_x - new_width / 2.0, -width, 2 * width),
        f32_to_i32_clamp(center_y - new_height / 2.0, -height, 2 * height),
        f32_to_i32_clamp(new_width, 0, 2 * width),
        f32_to_i32_clamp(new_height, 0, 2 * height),
    );

    clip_rect(expanded, width, height)
}

/// Lower half of a box — the torso/leg region used for attire color checks
#[must_use]
pub fn lower_half(rect: Rect) -> Rect {
    let top = rect.height / 2;
    Rect::new(rect.x, rect.y + top, rect.width, rect.height - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_rect_inside_is_unchanged() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(clip_rect(rect, 640, 480), Some(rect));
    }

    #[test]
    fn test_clip_rect_partial_overlap() {
        let rect = Rect::new(-10, -10, 50, 50);
        assert_eq!(clip_rect(rect, 640, 480), Some(Rect::new(0, 0, 40, 40)));

        let rect = Rect::new(620, 460, 50, 50);
        assert_eq!(clip_rect(rect, 640, 480), Some(Rect::new(620, 460, 20, 20)));
    }

    #[test]
    fn test_clip_rect_outside_is_none() {
        assert_eq!(clip_rect(Rect::new(700, 10, 50, 50), 640, 480), None);
        assert_eq!(clip_rect(Rect::new(-60, 10, 50, 50), 640, 480), None);
        assert_eq!(clip_rect(Rect::new(10, 10, 0, 50), 640, 480), None);
    }

    #[test]
    fn test_expand_rect_grows_about_center() {
        let rect = Rect::new(100, 100, 200, 400);
        let expanded = expand_rect(rect, 1.2, 640, 480).unwrap();

        assert_eq!(expanded.x, 80);
        assert_eq!(expanded.width, 240);
        // Vertical expansion runs past the frame and is reclipped
        assert_eq!(expanded.y, 60);
        assert_eq!(expanded.y + expanded.height, 480);
    }

    #[test]
    fn test_expand_rect_identity_factor() {
        let rect = Rect::new(50, 50, 100, 100);
        assert_eq!(expand_rect(rect, 1.0, 640, 480), Some(rect));
    }

    #[test]
    fn test_lower_half() {
        assert_eq!(lower_half(Rect::new(10, 20, 100, 80)), Rect::new(10, 60, 100, 40));
        // Odd heights round the split down, keeping the extra row below
        assert_eq!(lower_half(Rect::new(0, 0, 10, 5)), Rect::new(0, 2, 10, 3));
    }
}
