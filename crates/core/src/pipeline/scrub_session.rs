use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::gating::domain::content_gate::{ContentGate, GateTarget};
use crate::imaging::frame_ops::contain_frame;
use crate::mapping::domain::face_map::FaceCrop;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::processing::domain::processor_chain::ProcessorChain;
use crate::shared::frame::Frame;
use crate::shared::session_config::ConfigSource;
use crate::shared::session_error::SessionError;
use crate::video::domain::video_reader::{read_frame_at, ReaderFactory};

/// One rendered preview frame.
#[derive(Debug, Clone)]
pub struct ScrubFrame {
    pub frame: Frame,
    /// `false` when the source image had no detectable face; the chain then
    /// ran without a source and faces were left as they were.
    pub source_face_found: bool,
}

/// On-demand preview of a single frame of an image or video.
///
/// Every call is independent: the target frame and the source face are
/// decoded again each time, and the first failure ends the call.
pub struct ScrubSession {
    readers: Arc<dyn ReaderFactory>,
    analyser: Arc<dyn FaceAnalyser>,
    chain: ProcessorChain,
    config: Arc<dyn ConfigSource>,
    gate: Option<ContentGate>,
    logger: Box<dyn PipelineLogger>,
}

impl ScrubSession {
    pub fn new(
        readers: Arc<dyn ReaderFactory>,
        analyser: Arc<dyn FaceAnalyser>,
        chain: ProcessorChain,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            readers,
            analyser,
            chain,
            config,
            gate: None,
            logger: Box::new(NullPipelineLogger),
        }
    }

    /// Gate used when `nsfw_filter` is on. Without one the switch has no
    /// effect.
    pub fn with_gate(mut self, gate: ContentGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Renders frame `frame_index` of `target` with the source face applied,
    /// scaled to fit inside `bounds`.
    ///
    /// Image targets ignore `frame_index`.
    pub fn render_frame(
        &mut self,
        target: &Path,
        frame_index: usize,
        source_path: Option<&Path>,
        bounds: (u32, u32),
    ) -> Result<ScrubFrame, SessionError> {
        let config = self.config.snapshot();

        let (metadata, frame) = read_frame_at(self.readers.as_ref(), target, frame_index)
            .map_err(|e| SessionError::NotReadable(format!("{}: {e}", target.display())))?;
        let mut frame = frame.ok_or_else(|| {
            SessionError::NotReadable(format!(
                "frame {frame_index} of {}",
                target.display()
            ))
        })?;
        if !metadata.is_still_image() {
            frame.set_index(frame_index);
        }

        if config.nsfw_filter {
            if let Some(gate) = &self.gate {
                gate.ensure_allowed(GateTarget::Frame(&frame))?;
            }
        }

        let source = match source_path {
            Some(path) => self.source_face(path)?,
            None => None,
        };
        if source.is_none() {
            self.logger.info("No face in source image; previewing target as is");
        }

        let processed = self
            .chain
            .apply_single(source.as_ref(), frame, self.logger.as_mut())?;

        let (w, h) = bounds;
        let resized = contain_frame(&processed, w, h)
            .map_err(|e| SessionError::processing("contain", e))?;

        Ok(ScrubFrame {
            frame: resized,
            source_face_found: source.is_some(),
        })
    }

    /// [`ScrubSession::render_frame`] bounded by the configured preview size.
    pub fn render_preview(
        &mut self,
        target: &Path,
        frame_index: usize,
        source_path: Option<&Path>,
    ) -> Result<ScrubFrame, SessionError> {
        let bounds = self.config.snapshot().preview_max;
        self.render_frame(
            target,
            frame_index,
            source_path,
            (bounds.width, bounds.height),
        )
    }

    /// Number of frames the slider can address; 1 for still images.
    pub fn frame_count(&self, target: &Path) -> Result<usize, SessionError> {
        let mut reader = self.readers.reader_for(target);
        let metadata = reader
            .open(target)
            .map_err(|e| SessionError::NotReadable(format!("{}: {e}", target.display())))?;
        reader.close();
        Ok(if metadata.is_still_image() {
            1
        } else {
            metadata.total_frames
        })
    }

    /// Decodes the source image and detects its face. A missing face is
    /// `Ok(None)`.
    fn source_face(&self, path: &Path) -> Result<Option<FaceCrop>, SessionError> {
        let (_, image) = read_frame_at(self.readers.as_ref(), path, 0)
            .map_err(|e| SessionError::NotReadable(format!("{}: {e}", path.display())))?;
        let image = image
            .ok_or_else(|| SessionError::NotReadable(format!("{}: empty image", path.display())))?;
        match FaceCrop::detect(&image, self.analyser.as_ref()) {
            Ok(crop) => Ok(Some(crop)),
            Err(SessionError::NoFaceDetected) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Moves the slider by `delta` frames, clamped to `[0, total]`.
pub fn navigate(current: usize, delta: i64, total: usize) -> usize {
    let next = current as i64 + delta;
    next.clamp(0, total as i64) as usize
}
