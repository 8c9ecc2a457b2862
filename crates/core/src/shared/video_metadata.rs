use std::path::PathBuf;

/// Stream properties reported by a [`crate::video::domain::video_reader::VideoReader`].
///
/// Still images are represented as a one-frame video with `fps = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn still_image(width: u32, height: u32, codec: &str, source_path: Option<PathBuf>) -> Self {
        Self {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: codec.to_string(),
            source_path,
        }
    }

    pub fn is_still_image(&self) -> bool {
        self.fps == 0.0 && self.total_frames == 1
    }
}
