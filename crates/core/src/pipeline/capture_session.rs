use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::capture::domain::camera::{CameraLease, CameraProvider, CaptureFormat};
use crate::capture::domain::capture_state::CaptureState;
use crate::capture::domain::fps_meter::FpsMeter;
use crate::capture::domain::renderer::Renderer;
use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::gating::domain::content_gate::{ContentGate, GateTarget};
use crate::imaging::frame_ops::{fit_frame_to_size, mirror_horizontal};
use crate::imaging::text_overlay::draw_fps;
use crate::mapping::domain::face_map::{FaceCrop, SharedFaceMap};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::processing::domain::processor_chain::ProcessorChain;
use crate::shared::frame::Frame;
use crate::shared::session_config::{ConfigSnapshot, ConfigSource};
use crate::shared::session_error::SessionError;
use crate::video::domain::video_reader::{read_frame_at, ReaderFactory};

/// Outcome of one live run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureReport {
    pub frames_rendered: usize,
    pub frames_dropped: usize,
    /// Last windowed fps, 0 if no window closed.
    pub last_fps: f64,
}

/// Continuous camera loop: read, mirror, fit, gate, process, measure,
/// overlay, render.
///
/// A frame that fails anywhere after the read is dropped and the loop moves
/// on. The camera is held in a [`CameraLease`] and released before the
/// session reports [`CaptureState::Closed`], whatever ended the loop.
pub struct CaptureSession {
    provider: Arc<dyn CameraProvider>,
    renderer: Box<dyn Renderer>,
    chain: ProcessorChain,
    analyser: Arc<dyn FaceAnalyser>,
    readers: Arc<dyn ReaderFactory>,
    config: Arc<dyn ConfigSource>,
    gate: Option<ContentGate>,
    face_map: Option<SharedFaceMap>,
    logger: Box<dyn PipelineLogger>,
    frame_limit: Option<usize>,
    stop: Arc<AtomicBool>,
    state: CaptureState,
    lease: Option<CameraLease>,
    fps: FpsMeter,
    report: CaptureReport,
    last_frame: Option<Frame>,
    last_error: Option<SessionError>,
    source_cache: Option<(PathBuf, Option<FaceCrop>)>,
}

impl CaptureSession {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        renderer: Box<dyn Renderer>,
        chain: ProcessorChain,
        analyser: Arc<dyn FaceAnalyser>,
        readers: Arc<dyn ReaderFactory>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            provider,
            renderer,
            chain,
            analyser,
            readers,
            config,
            gate: None,
            face_map: None,
            logger: Box::new(NullPipelineLogger),
            frame_limit: None,
            stop: Arc::new(AtomicBool::new(false)),
            state: CaptureState::Idle,
            lease: None,
            fps: FpsMeter::new(Instant::now()),
            report: CaptureReport::default(),
            last_frame: None,
            last_error: None,
            source_cache: None,
        }
    }

    pub fn with_gate(mut self, gate: ContentGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Map used when `map_faces` is on.
    pub fn with_face_map(mut self, face_map: SharedFaceMap) -> Self {
        self.face_map = Some(face_map);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Stops on its own after `frames` rendered frames.
    pub fn with_frame_limit(mut self, frames: usize) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Swaps the logger, returning the previous one.
    pub fn replace_logger(&mut self, logger: Box<dyn PipelineLogger>) -> Box<dyn PipelineLogger> {
        std::mem::replace(&mut self.logger, logger)
    }

    /// Flag polled once per iteration; setting it ends the loop after the
    /// frame in flight. Cleared when the session closes.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    /// Opens camera `index` and enters `Running`.
    ///
    /// In mapped mode the face map must have a complete entry before the
    /// camera is touched. Any failure leaves the session `Idle`.
    pub fn start(&mut self, index: usize) -> Result<(), SessionError> {
        if self.state.holds_camera() || self.state == CaptureState::Opening {
            return Err(SessionError::CameraUnavailable {
                index,
                reason: format!("session is already {}", self.state),
            });
        }
        let config = self.config.snapshot();
        config.validate()?;
        if config.map_faces {
            self.require_valid_map()?;
        }

        self.transition(CaptureState::Opening);
        let format = CaptureFormat::from(config.camera);
        let camera = match self.provider.open(index, format) {
            Ok(camera) => camera,
            Err(e) => {
                self.transition(CaptureState::Idle);
                let err = SessionError::CameraUnavailable {
                    index,
                    reason: e.to_string(),
                };
                log::error!("{err}");
                return Err(err);
            }
        };

        self.lease = Some(CameraLease::new(camera, index));
        self.report = CaptureReport::default();
        self.last_error = None;
        self.fps = FpsMeter::new(Instant::now());
        self.transition(CaptureState::Running);
        self.logger.info(&format!(
            "Capturing from camera {index} at {}x{} @ {} fps",
            format.width, format.height, format.fps
        ));
        Ok(())
    }

    /// Runs the loop until the stop flag, the frame limit or end of stream,
    /// then releases the camera.
    pub fn run_loop(&mut self) -> CaptureReport {
        if self.state != CaptureState::Running {
            log::debug!("run_loop called while {}", self.state);
            return self.report.clone();
        }

        while self.state == CaptureState::Running {
            let frame = match self.read_frame() {
                Some(frame) => frame,
                None => {
                    self.transition(CaptureState::Stopping);
                    break;
                }
            };

            let config = self.config.snapshot();
            match self.process(frame, &config) {
                Ok(frame) => self.present(frame, &config),
                Err(e) => self.drop_frame(e),
            }

            let limit_reached = self
                .frame_limit
                .is_some_and(|limit| self.report.frames_rendered >= limit);
            if self.stop.load(Ordering::Relaxed) || limit_reached {
                self.transition(CaptureState::Stopping);
            }
        }

        self.close();
        self.logger.summary();
        self.report.clone()
    }

    /// [`CaptureSession::start`] followed by [`CaptureSession::run_loop`].
    pub fn run(&mut self, index: usize) -> Result<CaptureReport, SessionError> {
        self.start(index)?;
        Ok(self.run_loop())
    }

    fn transition(&mut self, next: CaptureState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal capture transition {} -> {next}",
            self.state
        );
        log::debug!("Capture session {} -> {next}", self.state);
        self.state = next;
    }

    fn require_valid_map(&self) -> Result<(), SessionError> {
        let map = self.face_map.as_ref().ok_or(SessionError::NoValidMapping)?;
        let guard = match map.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.require_valid()
    }

    /// A read error ends the stream like EOF does.
    fn read_frame(&mut self) -> Option<Frame> {
        let lease = self.lease.as_mut()?;
        match lease.read() {
            Ok(frame) => frame,
            Err(e) => {
                log::info!("Camera {} read failed, stopping: {e}", lease.index());
                None
            }
        }
    }

    fn process(&mut self, frame: Frame, config: &ConfigSnapshot) -> Result<Frame, SessionError> {
        let mut frame = frame;
        if config.live_mirror {
            frame = mirror_horizontal(&frame).map_err(|e| SessionError::processing("mirror", e))?;
        }
        if config.live_resizable {
            if let Some((w, h)) = self.renderer.display_size() {
                frame = fit_frame_to_size(&frame, w, h)
                    .map_err(|e| SessionError::processing("fit-to-size", e))?;
            }
        }
        if config.nsfw_filter {
            if let Some(gate) = &self.gate {
                gate.ensure_allowed(GateTarget::Frame(&frame))?;
            }
        }

        if config.map_faces {
            let map = self.face_map.as_ref().ok_or(SessionError::NoValidMapping)?;
            self.chain.apply_mapped(map, frame, self.logger.as_mut())
        } else {
            let source = self.source_face(config.source_path.as_deref());
            self.chain
                .apply_single(source.as_ref(), frame, self.logger.as_mut())
        }
    }

    /// Source face for single mode, re-detected only when the path changes.
    fn source_face(&mut self, path: Option<&Path>) -> Option<FaceCrop> {
        let path = path?;
        let cached = matches!(&self.source_cache, Some((cached, _)) if cached == path);
        if !cached {
            let face = self.detect_source(path);
            self.source_cache = Some((path.to_path_buf(), face));
        }
        self.source_cache
            .as_ref()
            .and_then(|(_, face)| face.clone())
    }

    fn detect_source(&mut self, path: &Path) -> Option<FaceCrop> {
        let image = match read_frame_at(self.readers.as_ref(), path, 0) {
            Ok((_, Some(image))) => image,
            Ok((_, None)) => {
                self.logger.warn(&format!("{} has no frames", path.display()));
                return None;
            }
            Err(e) => {
                self.logger.warn(&format!("Cannot read {}: {e}", path.display()));
                return None;
            }
        };
        match FaceCrop::detect(&image, self.analyser.as_ref()) {
            Ok(face) => Some(face),
            Err(e) => {
                self.logger.warn(&format!("Source {}: {e}", path.display()));
                None
            }
        }
    }

    fn present(&mut self, mut frame: Frame, config: &ConfigSnapshot) {
        if let Some(fps) = self.fps.record(Instant::now()) {
            self.logger.metric("fps", fps);
            self.report.last_fps = fps;
        }
        if config.show_fps {
            draw_fps(&mut frame, self.fps.current());
        }
        self.renderer.display(&frame);
        self.report.frames_rendered += 1;
        self.logger.progress(self.report.frames_rendered, 0);
        self.last_frame = Some(frame);
    }

    fn drop_frame(&mut self, err: SessionError) {
        self.report.frames_dropped += 1;
        self.logger
            .metric("frames_dropped", self.report.frames_dropped as f64);
        self.logger.frame_dropped(&err.to_string());
        self.last_error = Some(err);
    }

    fn close(&mut self) {
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
        self.stop.store(false, Ordering::Relaxed);
        self.transition(CaptureState::Closed);
        self.logger.info(&format!(
            "Capture closed: {} rendered, {} dropped",
            self.report.frames_rendered, self.report.frames_dropped
        ));
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
    }
}
