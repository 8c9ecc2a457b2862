use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a single frame as an image: scrub previews, mapper thumbnails and
/// the latest live frame all go through this.
pub trait ImageWriter: Send {
    /// Writes `frame` to `path`, resized to `size` when given.
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
