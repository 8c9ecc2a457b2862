use std::fmt;

/// Lifecycle of a capture session.
///
/// `Idle -> Opening -> Running -> Stopping -> Closed`; a failed open goes
/// back to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Idle,
    Opening,
    Running,
    Stopping,
    Closed,
}

impl CaptureState {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: CaptureState) -> bool {
        use CaptureState::*;
        matches!(
            (self, next),
            (Idle, Opening)
                | (Opening, Running)
                | (Opening, Idle)
                | (Running, Stopping)
                | (Stopping, Closed)
                | (Closed, Opening)
        )
    }

    /// True while the session owns the camera.
    pub fn holds_camera(self) -> bool {
        matches!(self, CaptureState::Running | CaptureState::Stopping)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Opening => "opening",
            CaptureState::Running => "running",
            CaptureState::Stopping => "stopping",
            CaptureState::Closed => "closed",
        };
        f.write_str(name)
    }
}
