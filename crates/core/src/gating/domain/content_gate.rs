use std::path::Path;
use std::sync::Arc;

use crate::shared::constants::is_image;
use crate::shared::frame::Frame;
use crate::shared::session_error::SessionError;

use super::content_classifier::ContentClassifier;

pub const CONTENT_GATE_NAME: &str = "content-gate";

/// What the gate is asked to look at.
#[derive(Clone, Copy, Debug)]
pub enum GateTarget<'a> {
    /// A file on disk, routed by extension to the image or video classifier.
    File(&'a Path),
    /// A decoded frame.
    Frame(&'a Frame),
}

/// Routes gating checks to the matching classifier entry point.
///
/// Results are never cached: every call classifies, so each scrubbed or
/// captured frame gets its own verdict.
#[derive(Clone)]
pub struct ContentGate {
    classifier: Arc<dyn ContentClassifier>,
}

impl ContentGate {
    pub fn new(classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { classifier }
    }

    /// Returns `true` when the target should be blocked.
    pub fn check(&self, target: GateTarget<'_>) -> Result<bool, SessionError> {
        let verdict = match target {
            GateTarget::File(path) if is_image(path) => self.classifier.classify_image(path),
            GateTarget::File(path) => self.classifier.classify_video(path),
            GateTarget::Frame(frame) => self.classifier.classify_frame(frame),
        };
        let blocked = verdict.map_err(|e| SessionError::processing(CONTENT_GATE_NAME, e))?;
        if blocked {
            log::info!("Content gate blocked {}", describe(&target));
        }
        Ok(blocked)
    }

    /// Like [`ContentGate::check`], but a blocked target is
    /// [`SessionError::ContentBlocked`].
    pub fn ensure_allowed(&self, target: GateTarget<'_>) -> Result<(), SessionError> {
        if self.check(target)? {
            Err(SessionError::ContentBlocked)
        } else {
            Ok(())
        }
    }
}

fn describe(target: &GateTarget<'_>) -> String {
    match target {
        GateTarget::File(path) => path.display().to_string(),
        GateTarget::Frame(frame) => format!("frame {}", frame.index()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records which entry point was called and answers with `verdict`.
    struct StubClassifier {
        verdict: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ContentClassifier for StubClassifier {
        fn classify_image(&self, _path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push("image");
            Ok(self.verdict)
        }

        fn classify_video(&self, _path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push("video");
            Ok(self.verdict)
        }

        fn classify_frame(&self, _frame: &Frame) -> Result<bool, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push("frame");
            Ok(self.verdict)
        }
    }

    struct FailingClassifier;

    impl ContentClassifier for FailingClassifier {
        fn classify_image(&self, _path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
            Err("model missing".into())
        }

        fn classify_video(&self, _path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
            Err("model missing".into())
        }

        fn classify_frame(&self, _frame: &Frame) -> Result<bool, Box<dyn std::error::Error>> {
            Err("model missing".into())
        }
    }

    fn gate(verdict: bool) -> (ContentGate, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let gate = ContentGate::new(Arc::new(StubClassifier {
            verdict,
            calls: calls.clone(),
        }));
        (gate, calls)
    }

    #[test]
    fn test_files_are_routed_by_extension() {
        let (gate, calls) = gate(false);
        gate.check(GateTarget::File(Path::new("me.JPG"))).unwrap();
        gate.check(GateTarget::File(Path::new("clip.mp4"))).unwrap();
        gate.check(GateTarget::File(Path::new("no_extension"))).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["image", "video", "video"]);
    }

    #[test]
    fn test_every_frame_is_classified() {
        let (gate, calls) = gate(true);
        let frame = Frame::filled(2, 2, [0, 0, 0], 0);
        assert!(gate.check(GateTarget::Frame(&frame)).unwrap());
        assert!(gate.check(GateTarget::Frame(&frame)).unwrap());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_ensure_allowed_maps_block_to_error() {
        let (blocking, _) = gate(true);
        let (open, _) = gate(false);
        let frame = Frame::filled(2, 2, [0, 0, 0], 0);
        assert_eq!(
            blocking.ensure_allowed(GateTarget::Frame(&frame)),
            Err(SessionError::ContentBlocked)
        );
        assert_eq!(open.ensure_allowed(GateTarget::Frame(&frame)), Ok(()));
    }

    #[test]
    fn test_classifier_error_is_processing_failure() {
        let gate = ContentGate::new(Arc::new(FailingClassifier));
        let err = gate
            .check(GateTarget::File(Path::new("me.png")))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::ProcessingFailed {
                module: CONTENT_GATE_NAME.into(),
                message: "model missing".into()
            }
        );
    }
}
