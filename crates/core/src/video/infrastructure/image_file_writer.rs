use std::path::Path;

use crate::imaging::frame_ops::{thumbnail, to_rgb_image};
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Writes frames to image files with the `image` crate; the format follows
/// the file extension.
///
/// Used for scrub previews, mapper thumbnails and the file-backed renderer.
#[derive(Default)]
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let img = match size {
            Some((w, h)) => to_rgb_image(&thumbnail(frame, w, h)?)?,
            None => to_rgb_image(frame)?,
        };
        img.save(path)?;
        Ok(())
    }
}
