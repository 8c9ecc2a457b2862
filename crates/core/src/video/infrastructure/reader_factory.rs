use std::path::Path;

use crate::shared::constants::is_image;
use crate::video::domain::video_reader::{ReaderFactory, VideoReader};

use super::ffmpeg_reader::FfmpegReader;
use super::image_file_reader::ImageFileReader;

/// Image extensions go to [`ImageFileReader`], everything else to
/// [`FfmpegReader`].
#[derive(Default)]
pub struct DefaultReaderFactory;

impl ReaderFactory for DefaultReaderFactory {
    fn reader_for(&self, path: &Path) -> Box<dyn VideoReader> {
        if is_image(path) {
            Box::new(ImageFileReader::new())
        } else {
            Box::new(FfmpegReader::new())
        }
    }
}
