use std::sync::Arc;

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::processing::domain::processor_chain::{FailurePolicy, ProcessorChain};
use crate::shared::constants::FACE_ENHANCER_FLAG;
use crate::shared::session_config::ConfigSnapshot;

use super::face_enhance_processor::FaceEnhanceProcessor;
use super::face_paste_processor::FacePasteProcessor;

/// Builds the processor chain described by the session switches.
///
/// Face paste always runs first; the enhancer follows when its module flag
/// is on.
pub fn build_chain(
    config: &ConfigSnapshot,
    analyser: Arc<dyn FaceAnalyser>,
    policy: FailurePolicy,
) -> ProcessorChain {
    let mut chain = ProcessorChain::with_policy(policy);
    chain.push(Box::new(FacePasteProcessor::new(
        analyser.clone(),
        config.opacity(),
        config.many_faces,
    )));
    if config.module_enabled(FACE_ENHANCER_FLAG) {
        chain.push(Box::new(FaceEnhanceProcessor::new(analyser)));
    }
    log::info!(
        "Processor chain: [{}] ({:?} on failure)",
        chain.names().join(", "),
        policy
    );
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_descriptor::FaceDescriptor;
    use crate::processing::infrastructure::face_enhance_processor::FACE_ENHANCE_NAME;
    use crate::processing::infrastructure::face_paste_processor::FACE_PASTE_NAME;
    use crate::shared::frame::Frame;

    struct NoFaces;

    impl FaceAnalyser for NoFaces {
        fn detect_faces(
            &self,
            _frame: &Frame,
        ) -> Result<Vec<FaceDescriptor>, Box<dyn std::error::Error>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_default_config_builds_paste_only() {
        let config = ConfigSnapshot::default();
        let chain = build_chain(&config, Arc::new(NoFaces), FailurePolicy::Abort);
        assert_eq!(chain.names(), vec![FACE_PASTE_NAME]);
        assert_eq!(chain.policy(), FailurePolicy::Abort);
    }

    #[test]
    fn test_enhancer_flag_appends_enhancer() {
        let mut config = ConfigSnapshot::default();
        config
            .module_flags
            .insert(FACE_ENHANCER_FLAG.to_string(), true);

        let chain = build_chain(&config, Arc::new(NoFaces), FailurePolicy::Skip);
        assert_eq!(chain.names(), vec![FACE_PASTE_NAME, FACE_ENHANCE_NAME]);
        assert_eq!(chain.policy(), FailurePolicy::Skip);
    }
}
