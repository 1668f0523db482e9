//! Constants used throughout the application

/// Number of landmarks in the face mesh topology
pub const NUM_FACE_MESH_LANDMARKS: usize = 468;

/// Length of a face signature vector (468 points x 3 coordinates)
pub const SIGNATURE_LENGTH: usize = NUM_FACE_MESH_LANDMARKS * 3;

/// Number of landmarks in the body pose topology
pub const NUM_POSE_LANDMARKS: usize = 33;

/// First lower-body landmark index in the pose topology (left hip)
pub const POSE_LOWER_BODY_START: usize = 23;

/// Default cosine similarity threshold for identity recognition
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Default number of evidence captures per unknown face
pub const DEFAULT_CAPTURE_LIMIT: u32 = 3;

/// Default minimum spacing between evidence captures in seconds
pub const DEFAULT_CAPTURE_INTERVAL_SECS: f64 = 2.0;

/// Default expansion factor applied to person boxes before face search
pub const DEFAULT_BOX_EXPANSION: f32 = 1.2;

/// Number of clusters used for dominant color extraction
pub const DOMINANT_COLOR_CLUSTERS: i32 = 3;

/// Maximum K-means iterations per attempt
pub const KMEANS_MAX_ITERATIONS: i32 = 10;

/// K-means convergence epsilon
pub const KMEANS_EPSILON: f64 = 1.0;

/// Number of K-means attempts with random initialization
pub const KMEANS_ATTEMPTS: i32 = 10;

/// Image normalization constants for detector inputs
pub const IMAGE_NORMALIZATION_SCALE: f32 = 255.0;

/// Numeric precision epsilon
pub const EPSILON: f32 = 1e-10;
