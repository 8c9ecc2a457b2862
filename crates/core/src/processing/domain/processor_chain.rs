use std::time::Instant;

use crate::mapping::domain::face_map::{FaceCrop, SharedFaceMap, SimplifiedMap};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::shared::session_error::SessionError;

use super::frame_processor::FrameProcessor;

/// What the chain does when one of its processors fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the failing processor and discard the frame.
    #[default]
    Abort,
    /// Log the failure and hand the previous frame to the next processor.
    Skip,
}

/// Ordered list of [`FrameProcessor`]s applied to every frame.
///
/// Processors run strictly in registration order, each receiving the frame
/// the previous one returned. An empty chain returns its input unchanged.
/// A processor may change the frame's dimensions; only a zero-sized result is
/// rejected.
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn FrameProcessor>>,
    policy: FailurePolicy,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            processors: Vec::new(),
            policy,
        }
    }

    pub fn push(&mut self, processor: Box<dyn FrameProcessor>) {
        self.processors.push(processor);
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn apply_single(
        &mut self,
        source: Option<&FaceCrop>,
        frame: Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Frame, SessionError> {
        self.run(frame, logger, |p, f| p.apply_single(source, f))
    }

    /// Runs the chain in mapped mode.
    ///
    /// The registry's read guard is held until the last processor returns, so
    /// edits wait for the frame in flight.
    pub fn apply_mapped(
        &mut self,
        map: &SharedFaceMap,
        frame: Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Frame, SessionError> {
        let guard = match map.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let simplified: SimplifiedMap = guard.simplify();
        let result = self.run(frame, logger, |p, f| p.apply_mapped(&simplified, f));
        drop(guard);
        result
    }

    fn run<F>(
        &mut self,
        mut frame: Frame,
        logger: &mut dyn PipelineLogger,
        mut step: F,
    ) -> Result<Frame, SessionError>
    where
        F: FnMut(&mut dyn FrameProcessor, Frame) -> Result<Frame, Box<dyn std::error::Error>>,
    {
        let skip = self.policy == FailurePolicy::Skip;

        for processor in self.processors.iter_mut() {
            let fallback = skip.then(|| frame.clone());
            let start = Instant::now();
            let result = step(processor.as_mut(), frame);
            logger.timing(processor.name(), start.elapsed().as_secs_f64() * 1000.0);

            frame = match (result, fallback) {
                (Ok(out), _) if out.is_empty() => {
                    return Err(SessionError::DimensionMismatch {
                        module: processor.name().to_string(),
                        width: out.width(),
                        height: out.height(),
                    });
                }
                (Ok(out), _) => out,
                (Err(e), Some(previous)) => {
                    log::warn!(
                        "Frame processor '{}' failed, skipping: {e}",
                        processor.name()
                    );
                    previous
                }
                (Err(e), None) => return Err(SessionError::processing(processor.name(), e)),
            };
        }
        Ok(frame)
    }
}
