use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::capture_session::{CaptureReport, CaptureSession};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};

/// Events sent from the capture thread.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started,
    Fps(f64),
    FrameDropped(String),
    /// A recoverable problem that did not cost a frame.
    Warning(String),
    Finished(CaptureReport),
    Error(String),
}

/// Turns fps metrics, dropped frames and warnings into events, then passes
/// everything on to the session's own logger.
struct ChannelLogger {
    tx: Sender<CaptureEvent>,
    inner: Box<dyn PipelineLogger>,
}

impl PipelineLogger for ChannelLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.inner.progress(current, total);
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.inner.timing(stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        if name == "fps" {
            let _ = self.tx.send(CaptureEvent::Fps(value));
        }
        self.inner.metric(name, value);
    }

    fn info(&mut self, message: &str) {
        self.inner.info(message);
    }

    fn warn(&mut self, message: &str) {
        let _ = self.tx.send(CaptureEvent::Warning(message.to_string()));
        self.inner.warn(message);
    }

    fn frame_dropped(&mut self, reason: &str) {
        let _ = self.tx.send(CaptureEvent::FrameDropped(reason.to_string()));
        self.inner.frame_dropped(reason);
    }

    fn summary(&self) {
        self.inner.summary();
    }
}

/// Runs `session` on camera `camera_index` in a background thread.
///
/// Returns the event receiver and the session's stop flag. The camera is
/// released before [`CaptureEvent::Finished`] is sent; a failed start sends
/// [`CaptureEvent::Error`] instead.
pub fn spawn(
    mut session: CaptureSession,
    camera_index: usize,
) -> (Receiver<CaptureEvent>, Arc<AtomicBool>) {
    let (tx, rx) = crossbeam_channel::unbounded::<CaptureEvent>();
    let stop = session.stop_handle();

    let inner = session.replace_logger(Box::new(NullPipelineLogger));
    session.replace_logger(Box::new(ChannelLogger {
        tx: tx.clone(),
        inner,
    }));

    thread::spawn(move || {
        if let Err(e) = session.start(camera_index) {
            let _ = tx.send(CaptureEvent::Error(e.to_string()));
            return;
        }
        let _ = tx.send(CaptureEvent::Started);
        let report = session.run_loop();
        let _ = tx.send(CaptureEvent::Finished(report));
    });

    (rx, stop)
}
