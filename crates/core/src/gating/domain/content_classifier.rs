use std::path::Path;

use crate::shared::frame::Frame;

/// Domain interface for the content-safety classifier.
///
/// Each method returns `true` when the content should be blocked.
pub trait ContentClassifier: Send + Sync {
    fn classify_image(&self, path: &Path) -> Result<bool, Box<dyn std::error::Error>>;

    fn classify_video(&self, path: &Path) -> Result<bool, Box<dyn std::error::Error>>;

    fn classify_frame(&self, frame: &Frame) -> Result<bool, Box<dyn std::error::Error>>;
}
