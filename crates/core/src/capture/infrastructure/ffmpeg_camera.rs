use std::path::{Path, PathBuf};

use crate::capture::domain::camera::{Camera, CameraInfo, CameraProvider, CaptureFormat};
use crate::shared::frame::Frame;
use crate::video::infrastructure::ffmpeg_reader::{extract_rgb_pixels, open_decoder};

#[cfg(target_os = "linux")]
const DEVICE_FORMAT: Option<&str> = Some("v4l2");
#[cfg(target_os = "macos")]
const DEVICE_FORMAT: Option<&str> = Some("avfoundation");
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const DEVICE_FORMAT: Option<&str> = None;

/// Highest `/dev/videoN` checked when listing cameras.
const MAX_SCANNED_DEVICES: usize = 64;

/// Opens cameras through ffmpeg input devices (`v4l2` on Linux,
/// `avfoundation` on macOS).
pub struct FfmpegCameraProvider {
    dev_dir: PathBuf,
    sys_dir: PathBuf,
}

impl FfmpegCameraProvider {
    pub fn new() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            sys_dir: PathBuf::from("/sys/class/video4linux"),
        }
    }

    fn device_url(&self, index: usize) -> String {
        if cfg!(target_os = "macos") {
            index.to_string()
        } else {
            self.dev_dir
                .join(format!("video{index}"))
                .to_string_lossy()
                .into_owned()
        }
    }
}

impl Default for FfmpegCameraProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists `video{N}` nodes under `dev_dir`, naming them from sysfs when it
/// has an entry.
fn scan_devices(dev_dir: &Path, sys_dir: &Path) -> Vec<CameraInfo> {
    (0..MAX_SCANNED_DEVICES)
        .filter(|index| dev_dir.join(format!("video{index}")).exists())
        .map(|index| {
            let name = std::fs::read_to_string(sys_dir.join(format!("video{index}")).join("name"))
                .map(|n| n.trim().to_string())
                .ok()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Camera {index}"));
            CameraInfo { index, name }
        })
        .collect()
}

fn find_input_format(name: &str) -> Option<ffmpeg_next::format::format::Input> {
    let mut devices = ffmpeg_next::device::input::video();
    devices.find(|fmt| fmt.name().split(',').any(|n| n == name))
}

impl CameraProvider for FfmpegCameraProvider {
    fn list_cameras(&self) -> Vec<CameraInfo> {
        if cfg!(target_os = "linux") {
            scan_devices(&self.dev_dir, &self.sys_dir)
        } else {
            Vec::new()
        }
    }

    fn open(
        &self,
        index: usize,
        format: CaptureFormat,
    ) -> Result<Box<dyn Camera>, Box<dyn std::error::Error>> {
        let device = DEVICE_FORMAT.ok_or("camera capture is not supported on this platform")?;

        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let input_format = find_input_format(device)
            .ok_or_else(|| format!("ffmpeg was built without the {device} input device"))?;

        let mut options = ffmpeg_next::Dictionary::new();
        let video_size = format!("{}x{}", format.width, format.height);
        options.set("video_size", &video_size);
        options.set("framerate", &format.fps.to_string());

        let url = self.device_url(index);
        let ictx = match ffmpeg_next::format::open_with(
            &url,
            &ffmpeg_next::format::format::Format::Input(input_format),
            options,
        )? {
            ffmpeg_next::format::context::Context::Input(ictx) => ictx,
            ffmpeg_next::format::context::Context::Output(_) => {
                return Err(format!("{url} opened as an output").into())
            }
        };

        let stream_index = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("camera has no video stream")?
            .index();
        let (decoder, scaler) = open_decoder(&ictx, stream_index)?;

        log::info!(
            "Opened camera {index} ({url}) at {}x{}",
            decoder.width(),
            decoder.height()
        );

        Ok(Box::new(FfmpegCamera {
            ictx: Some(ictx),
            decoder,
            scaler,
            stream_index,
            frame_index: 0,
        }))
    }
}

/// A camera opened through an ffmpeg input device.
struct FfmpegCamera {
    ictx: Option<ffmpeg_next::format::context::Input>,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    frame_index: usize,
}

// Safety: the camera is owned by exactly one capture session at a time.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    fn receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let (width, height) = (self.decoder.width(), self.decoder.height());
        let pixels = extract_rgb_pixels(&rgb, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}

impl Camera for FfmpegCamera {
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if let Some(frame) = self.receive()? {
            return Ok(Some(frame));
        }
        loop {
            let Some(ictx) = self.ictx.as_mut() else {
                return Ok(None);
            };
            let Some((stream, packet)) = ictx.packets().next() else {
                return Ok(None);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder.send_packet(&packet)?;
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn release(&mut self) {
        self.ictx = None;
    }
}
