//! Evidence capture for alert conditions.

use crate::{Error, Result};
use chrono::Local;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::path::PathBuf;

/// Sink for frames captured when an alert condition fires.
///
/// The pipeline calls this for unknown faces and disallowed attire colors;
/// tests substitute a recording stub.
pub trait EvidenceSink {
    /// Persist the current frame under the given reason tag
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be persisted.
    fn capture(&mut self, frame: &Mat, reason_tag: &str) -> Result<()>;
}

/// File-backed sink writing `alert_<tag>_<YYYYMMDD_HHMMSS>.jpg`.
///
/// There is no overwrite protection: two captures with the same tag within
/// the same second land on the same file.
pub struct FileEvidenceSink {
    directory: PathBuf,
}

impl FileEvidenceSink {
    /// Create a sink writing into `directory`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }
}

impl EvidenceSink for FileEvidenceSink {
    fn capture(&mut self, frame: &Mat, reason_tag: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.directory.join(format!("alert_{reason_tag}_{timestamp}.jpg"));

        let written = imgcodecs::imwrite(path.to_string_lossy().as_ref(), frame, &Vector::new())?;
        if !written {
            return Err(Error::EvidenceError(format!(
                "Failed to write evidence image {}",
                path.display()
            )));
        }

        log::info!("Captured evidence: {}", path.display());
        Ok(())
    }
}
