use thiserror::Error;

/// Failures surfaced by the face map, the processor chain and the sessions.
///
/// Collaborator traits keep returning `Box<dyn Error>`; these variants are
/// what a session reports once that error reaches its boundary. Every
/// variant carries owned strings so the error can cross the capture worker's
/// channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("could not open camera with index {index}: {reason}")]
    CameraUnavailable { index: usize, reason: String },

    #[error("face could not be detected in the image")]
    NoFaceDetected,

    #[error("processing ignored: content blocked by the gating filter")]
    ContentBlocked,

    #[error("frame processor '{module}' failed: {message}")]
    ProcessingFailed { module: String, message: String },

    #[error("could not read frame: {0}")]
    NotReadable(String),

    #[error("at least one source with target is required")]
    NoValidMapping,

    #[error("frame processor '{module}' returned an invalid {width}x{height} frame")]
    DimensionMismatch {
        module: String,
        width: u32,
        height: u32,
    },

    #[error("no face map entry with id {0}")]
    UnknownEntry(u32),

    #[error("face analysis failed: {0}")]
    Detection(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    pub fn processing(module: &str, err: impl std::fmt::Display) -> Self {
        SessionError::ProcessingFailed {
            module: module.to_string(),
            message: err.to_string(),
        }
    }
}
