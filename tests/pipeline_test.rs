//! Integration tests for the per-frame detection pipeline


use opencv::core::Rect;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use test_helpers::{solid_frame, synthetic_face_landmarks, RecordingEvidenceSink, StubLandmarkSource};
use vigil::compliance::{ColorRange, ComplianceClassifier};
use vigil::identity::IdentityStore;
use vigil::landmark_detection::{FaceLandmarks, LandmarkPoint};
use vigil::person_detection::PersonDetection;
use vigil::pipeline::{DetectionPipeline, REASON_DISALLOWED_COLOR, REASON_UNKNOWN_FACE};
use vigil::pose_detection::PoseLandmarks;
use vigil::recognition::RecognitionEngine;
use vigil::signature::FaceSignature;
use vigil::throttle::CaptureThrottler;

/// Range that contains HSV black, keeping dark test frames compliant
fn black_range() -> ColorRange {
    ColorRange::new("black", [0, 0, 0], [179, 255, 60])
}

fn build_pipeline(
    faces: Vec<FaceLandmarks>,
    store: IdentityStore,
    ranges: Vec<ColorRange>,
) -> (DetectionPipeline, Rc<RefCell<Vec<String>>>) {
    let (sink, calls) = RecordingEvidenceSink::new();
    let pipeline = DetectionPipeline::new(
        Box::new(StubLandmarkSource { faces }),
        Box::new(sink),
        store,
        RecognitionEngine::new(0.75),
        CaptureThrottler::new(3, Duration::from_secs_f64(2.0)),
        ComplianceClassifier::new(ranges),
        1.2,
    );
    (pipeline, calls)
}

/// Mirror of the pipeline's crop-to-frame landmark remap, used to build the
/// enrolled signature an in-frame face is expected to produce.
fn remap(points: &[LandmarkPoint], crop: Rect, frame_w: f32, frame_h: f32) -> Vec<LandmarkPoint> {
    points
        .iter()
        .map(|p| {
            LandmarkPoint::new(
                (crop.x as f32 + p.x * crop.width as f32) / frame_w,
                (crop.y as f32 + p.y * crop.height as f32) / frame_h,
                p.z * crop.width as f32 / frame_w,
            )
        })
        .collect()
}

#[test]
fn test_single_person_box_yields_one_remapped_face() {
    let frame = solid_frame(480, 640, 0.0, 0.0, 0.0);
    let persons = vec![PersonDetection::new(Rect::new(100, 100, 200, 400), 0.9)];
    let (mut pipeline, calls) = build_pipeline(
        vec![synthetic_face_landmarks(468)],
        IdentityStore::new(),
        vec![black_range()],
    );

    let result = pipeline.process_frame(&frame, &persons, None).unwrap();

    assert_eq!(result.faces.len(), 1);
    let face = &result.faces[0];
    for p in &face.landmarks.points {
        assert!((0.0..=1.0).contains(&p.x), "x out of frame range: {}", p.x);
        assert!((0.0..=1.0).contains(&p.y), "y out of frame range: {}", p.y);
    }
    // The crop starts at x=80 of a 640-wide frame, so remapped coordinates
    // cannot hug the left edge.
    assert!(face.landmarks.points.iter().all(|p| p.x > 0.1));

    // Unknown face: first sighting is always captured
    assert_eq!(face.identity, None);
    assert!(face.captured);
    assert_eq!(calls.borrow().as_slice(), [REASON_UNKNOWN_FACE]);
    assert_eq!(result.human_count, 1);
    assert!(!result.color_excluded);
}

#[test]
fn test_repeat_sighting_within_interval_is_not_recaptured() {
    let frame = solid_frame(480, 640, 0.0, 0.0, 0.0);
    let persons = vec![PersonDetection::new(Rect::new(100, 100, 200, 400), 0.9)];
    let (mut pipeline, calls) = build_pipeline(
        vec![synthetic_face_landmarks(468)],
        IdentityStore::new(),
        vec![black_range()],
    );

    let first = pipeline.process_frame(&frame, &persons, None).unwrap();
    let second = pipeline.process_frame(&frame, &persons, None).unwrap();

    assert!(first.faces[0].captured);
    assert!(!second.faces[0].captured);
    // Identical geometry hashes to the same fingerprint, so the immediate
    // re-sighting stays within the throttle interval.
    assert_eq!(calls.borrow().iter().filter(|t| *t == REASON_UNKNOWN_FACE).count(), 1);
}

#[test]
fn test_enrolled_face_is_recognized_and_not_captured() {
    let frame = solid_frame(480, 640, 0.0, 0.0, 0.0);
    let person_box = Rect::new(100, 100, 200, 400);
    let persons = vec![PersonDetection::new(person_box, 0.9)];

    // The pipeline sees the face inside the expanded crop of the person box;
    // enroll the signature of exactly that full-frame geometry.
    let crop_face = synthetic_face_landmarks(468);
    let expanded = Rect::new(80, 60, 240, 420);
    let enrolled_points = remap(&crop_face.points, expanded, 640.0, 480.0);
    let mut store = IdentityStore::new();
    store.insert("operator_a", FaceSignature::from_landmarks(&enrolled_points));

    let (mut pipeline, calls) = build_pipeline(vec![crop_face], store, vec![black_range()]);

    let result = pipeline.process_frame(&frame, &persons, None).unwrap();

    let face = &result.faces[0];
    assert_eq!(face.identity.as_deref(), Some("operator_a"));
    assert!(face.score > 0.99);
    assert!(!face.captured);
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_disallowed_attire_color_triggers_one_capture() {
    // Solid red frame: HSV (0, 255, 255), outside the navy-only palette
    let frame = solid_frame(480, 640, 0.0, 0.0, 255.0);
    let persons = vec![PersonDetection::new(Rect::new(100, 100, 200, 300), 0.9)];
    let (mut pipeline, calls) = build_pipeline(
        Vec::new(),
        IdentityStore::new(),
        vec![ColorRange::new("navy", [100, 80, 20], [130, 255, 180])],
    );

    let result = pipeline.process_frame(&frame, &persons, None).unwrap();

    assert!(result.color_excluded);
    assert_eq!(calls.borrow().as_slice(), [REASON_DISALLOWED_COLOR]);
    assert_eq!(result.human_count, 1);
}

#[test]
fn test_pose_region_matches_allowed_category() {
    // Solid green frame: HSV (60, 255, 255)
    let frame = solid_frame(480, 640, 0.0, 255.0, 0.0);
    let (mut pipeline, calls) = build_pipeline(
        Vec::new(),
        IdentityStore::new(),
        vec![
            ColorRange::new("navy", [100, 80, 20], [130, 255, 180]),
            ColorRange::new("hi_vis_green", [50, 100, 100], [70, 255, 255]),
        ],
    );

    let result = pipeline
        .process_frame(&frame, &[], Some(lower_body_skeleton()))
        .unwrap();

    assert!(!result.color_excluded);
    assert_eq!(result.matched_categories, ["hi_vis_green"]);
    assert!(calls.borrow().is_empty());
    // Pose presence alone counts one human
    assert_eq!(result.human_count, 1);
    assert!(result.pose.is_some());
}

#[test]
fn test_pose_region_with_disallowed_color_is_excluded() {
    let frame = solid_frame(480, 640, 0.0, 255.0, 0.0);
    let (mut pipeline, calls) = build_pipeline(
        Vec::new(),
        IdentityStore::new(),
        vec![ColorRange::new("navy", [100, 80, 20], [130, 255, 180])],
    );

    let result = pipeline
        .process_frame(&frame, &[], Some(lower_body_skeleton()))
        .unwrap();

    assert!(result.color_excluded);
    assert!(result.matched_categories.is_empty());
    assert_eq!(calls.borrow().as_slice(), [REASON_DISALLOWED_COLOR]);
}

#[test]
fn test_human_count_is_optimistic_fusion() {
    let frame = solid_frame(480, 640, 0.0, 0.0, 0.0);
    let (mut pipeline, _calls) = build_pipeline(Vec::new(), IdentityStore::new(), vec![black_range()]);

    let two_boxes = vec![
        PersonDetection::new(Rect::new(10, 10, 100, 200), 0.9),
        PersonDetection::new(Rect::new(300, 10, 100, 200), 0.8),
    ];
    let result = pipeline.process_frame(&frame, &two_boxes, None).unwrap();
    assert_eq!(result.human_count, 2);

    let result = pipeline.process_frame(&frame, &two_boxes, Some(lower_body_skeleton())).unwrap();
    assert_eq!(result.human_count, 2);

    let result = pipeline.process_frame(&frame, &[], Some(lower_body_skeleton())).unwrap();
    assert_eq!(result.human_count, 1);

    let result = pipeline.process_frame(&frame, &[], None).unwrap();
    assert_eq!(result.human_count, 0);
}

#[test]
fn test_out_of_frame_box_is_skipped() {
    let frame = solid_frame(480, 640, 0.0, 0.0, 0.0);
    let persons = vec![PersonDetection::new(Rect::new(700, 700, 50, 50), 0.9)];
    let (mut pipeline, calls) = build_pipeline(
        vec![synthetic_face_landmarks(468)],
        IdentityStore::new(),
        vec![black_range()],
    );

    let result = pipeline.process_frame(&frame, &persons, None).unwrap();

    // The box clips to nothing: no faces, no color checks, but the detector
    // still reported one person.
    assert!(result.faces.is_empty());
    assert!(calls.borrow().is_empty());
    assert_eq!(result.human_count, 1);
}

/// 33-point skeleton whose lower-body landmarks span the frame center
fn lower_body_skeleton() -> PoseLandmarks {
    let mut points = vec![LandmarkPoint::new(0.5, 0.2, 0.0); 23];
    for (x, y) in [(0.3, 0.5), (0.7, 0.5), (0.3, 0.6), (0.7, 0.6), (0.35, 0.7), (0.65, 0.7), (0.3, 0.85), (0.7, 0.85), (0.32, 0.9), (0.68, 0.9)] {
        points.push(LandmarkPoint::new(x, y, 0.0));
    }
    PoseLandmarks { points }
}
