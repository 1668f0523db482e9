//! Evidence-capture throttling for unrecognized faces.
//!
//! Each unknown signature fingerprint gets its own capture budget: the first
//! sighting is always captured, later sightings only while fewer than the
//! capture limit have been taken and the minimum interval has elapsed. This
//! bounds disk churn from a persistently-unrecognized face while still
//! gathering a handful of temporally-spread samples for later enrollment.
//!
//! Tracked fingerprints are never evicted; the table grows for the process
//! lifetime.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct TrackState {
    capture_count: u32,
    last_capture: Option<Instant>,
}

/// Per-fingerprint capture rate limiter
#[derive(Debug)]
pub struct CaptureThrottler {
    capture_limit: u32,
    min_interval: Duration,
    tracked: HashMap<u64, TrackState>,
}

impl CaptureThrottler {
    /// Create a throttler granting `capture_limit` captures per fingerprint,
    /// spaced more than `min_interval` apart.
    #[must_use]
    pub fn new(capture_limit: u32, min_interval: Duration) -> Self {
        Self {
            capture_limit,
            min_interval,
            tracked: HashMap::new(),
        }
    }

    /// Decide whether to capture evidence for this fingerprint now.
    ///
    /// A granted capture is recorded as a side effect: the fingerprint's
    /// count is incremented and its last-capture time stamped.
    pub fn should_capture(&mut self, fingerprint: u64) -> bool {
        self.should_capture_at(fingerprint, Instant::now())
    }

    /// Clock-injected variant of [`should_capture`](Self::should_capture)
    pub fn should_capture_at(&mut self, fingerprint: u64, now: Instant) -> bool {
        let state = self.tracked.entry(fingerprint).or_default();

        if state.capture_count >= self.capture_limit {
            return false;
        }

        // A fingerprint never captured before has unlimited elapsed time.
        let spaced = state
            .last_capture
            .map_or(true, |last| now.duration_since(last) > self.min_interval);

        if spaced {
            state.capture_count += 1;
            state.last_capture = Some(now);
        }

        spaced
    }

    /// Number of fingerprints tracked so far
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }
}
