use crate::shared::frame::Frame;
use crate::shared::session_config::CameraSettings;

/// A capture device found by [`CameraProvider::list_cameras`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraInfo {
    pub index: usize,
    pub name: String,
}

/// Requested capture resolution and rate. Devices may pick the closest mode
/// they support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl From<CameraSettings> for CaptureFormat {
    fn from(settings: CameraSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
        }
    }
}

/// An open capture device.
pub trait Camera: Send {
    /// Next frame, or `None` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Closes the device. Must be safe to call more than once.
    fn release(&mut self);
}

/// Enumerates and opens capture devices.
pub trait CameraProvider: Send + Sync {
    fn list_cameras(&self) -> Vec<CameraInfo>;

    fn open(
        &self,
        index: usize,
        format: CaptureFormat,
    ) -> Result<Box<dyn Camera>, Box<dyn std::error::Error>>;
}

/// Exclusive ownership of an open camera.
///
/// The device is released exactly once: by [`CameraLease::release`], or on
/// drop if the holder exits early.
pub struct CameraLease {
    camera: Option<Box<dyn Camera>>,
    index: usize,
}

impl CameraLease {
    pub fn new(camera: Box<dyn Camera>, index: usize) -> Self {
        Self {
            camera: Some(camera),
            index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_held(&self) -> bool {
        self.camera.is_some()
    }

    /// Reads a frame; a released lease reads as end of stream.
    pub fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        match self.camera.as_mut() {
            Some(camera) => camera.read(),
            None => Ok(None),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.release();
            log::debug!("Released camera {}", self.index);
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}
