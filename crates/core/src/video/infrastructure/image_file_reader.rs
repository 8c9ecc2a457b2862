use std::path::Path;

use crate::imaging::frame_ops::from_rgb_image;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Adapts a single image file to the [`VideoReader`] interface.
///
/// Treats the image as a one-frame video with `fps=0` and `total_frames=1`,
/// so image and video targets go through the same session code. Any frame
/// index resolves to the image itself.
pub struct ImageFileReader {
    frame: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { frame: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let img = image::open(path)?.to_rgb8();
        let frame = from_rgb_image(img, 0);
        let format = image::ImageFormat::from_path(path)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or_default();

        let metadata = VideoMetadata::still_image(
            frame.width(),
            frame.height(),
            format,
            Some(path.to_path_buf()),
        );
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match &self.frame {
            Some(frame) => Box::new(std::iter::once(Ok(frame.clone()))),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn frame_at(&mut self, _index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        match &self.frame {
            Some(frame) => Ok(Some(frame.clone())),
            None => Err("ImageFileReader: not opened".into()),
        }
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
