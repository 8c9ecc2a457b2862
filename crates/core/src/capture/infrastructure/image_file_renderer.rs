use std::path::{Path, PathBuf};

use crate::capture::domain::renderer::Renderer;
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Headless renderer: overwrites one image file with the latest live frame.
pub struct ImageFileRenderer {
    writer: Box<dyn ImageWriter>,
    path: PathBuf,
    display_size: Option<(u32, u32)>,
    frames_written: usize,
}

impl ImageFileRenderer {
    pub fn new(writer: Box<dyn ImageWriter>, path: &Path) -> Self {
        Self {
            writer,
            path: path.to_path_buf(),
            display_size: None,
            frames_written: 0,
        }
    }

    /// Reports a fixed display area so live frames get fitted to it.
    pub fn with_display_size(mut self, width: u32, height: u32) -> Self {
        self.display_size = Some((width, height));
        self
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

impl Renderer for ImageFileRenderer {
    fn display(&mut self, frame: &Frame) {
        match self.writer.write(&self.path, frame, None) {
            Ok(()) => self.frames_written += 1,
            Err(e) => log::warn!("Failed to write {}: {e}", self.path.display()),
        }
    }

    fn display_size(&self) -> Option<(u32, u32)> {
        self.display_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct StubImageWriter {
        written: Arc<Mutex<Vec<(PathBuf, usize)>>>,
        fail: bool,
    }

    impl ImageWriter for StubImageWriter {
        fn write(
            &self,
            path: &Path,
            frame: &Frame,
            _size: Option<(u32, u32)>,
        ) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail {
                return Err("disk full".into());
            }
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), frame.index()));
            Ok(())
        }
    }

    #[test]
    fn test_display_writes_each_frame_to_same_path() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let writer = StubImageWriter {
            written: written.clone(),
            fail: false,
        };
        let mut renderer = ImageFileRenderer::new(Box::new(writer), Path::new("/tmp/live.png"));

        renderer.display(&Frame::filled(2, 2, [0, 0, 0], 0));
        renderer.display(&Frame::filled(2, 2, [0, 0, 0], 1));

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|(p, _)| p == Path::new("/tmp/live.png")));
        assert_eq!(written[1].1, 1);
        assert_eq!(renderer.frames_written(), 2);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let writer = StubImageWriter {
            written: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut renderer = ImageFileRenderer::new(Box::new(writer), Path::new("live.png"));
        renderer.display(&Frame::filled(2, 2, [0, 0, 0], 0));
        assert_eq!(renderer.frames_written(), 0);
    }

    #[test]
    fn test_display_size() {
        let writer = StubImageWriter {
            written: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        };
        let renderer = ImageFileRenderer::new(Box::new(writer), Path::new("live.png"));
        assert_eq!(renderer.display_size(), None);
        assert_eq!(
            renderer.with_display_size(640, 360).display_size(),
            Some((640, 360))
        );
    }
}
