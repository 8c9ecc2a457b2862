use std::sync::Arc;

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::detection::domain::face_descriptor::FaceDescriptor;
use crate::imaging::frame_ops::paste_blend;
use crate::mapping::domain::face_map::{FaceCrop, SimplifiedMap};
use crate::mapping::domain::face_matcher::{match_faces, DEFAULT_MATCH_THRESHOLD};
use crate::processing::domain::frame_processor::FrameProcessor;
use crate::shared::frame::Frame;

pub const FACE_PASTE_NAME: &str = "face-paste";

/// Pixel-level face replacement: the source crop is resized onto each target
/// face box and blended in with the configured opacity.
///
/// Single mode replaces the left-most face, or every face with `many_faces`.
/// Mapped mode replaces each face matched to a map entry with that entry's
/// source and leaves unmatched faces alone.
pub struct FacePasteProcessor {
    analyser: Arc<dyn FaceAnalyser>,
    opacity: f32,
    many_faces: bool,
}

impl FacePasteProcessor {
    pub fn new(analyser: Arc<dyn FaceAnalyser>, opacity: f32, many_faces: bool) -> Self {
        Self {
            analyser,
            opacity: opacity.clamp(0.0, 1.0),
            many_faces,
        }
    }

    fn paste(
        &self,
        frame: &mut Frame,
        source: &FaceCrop,
        target: &FaceDescriptor,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let Some(rect) = target.bbox.to_pixel_rect(frame.width(), frame.height()) else {
            return Ok(());
        };
        paste_blend(frame, &source.image, rect, self.opacity)
    }
}

impl FrameProcessor for FacePasteProcessor {
    fn name(&self) -> &str {
        FACE_PASTE_NAME
    }

    fn apply_single(
        &mut self,
        source: Option<&FaceCrop>,
        mut frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let Some(source) = source else {
            return Ok(frame);
        };
        let targets = if self.many_faces {
            self.analyser.detect_faces(&frame)?
        } else {
            self.analyser.detect_one_face(&frame)?.into_iter().collect()
        };
        for target in &targets {
            self.paste(&mut frame, source, target)?;
        }
        Ok(frame)
    }

    fn apply_mapped(
        &mut self,
        map: &SimplifiedMap,
        mut frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        if map.is_empty() {
            return Ok(frame);
        }
        let faces = self.analyser.detect_faces(&frame)?;
        let matches = match_faces(&faces, map, DEFAULT_MATCH_THRESHOLD);
        for (face, pair) in faces.iter().zip(matches) {
            if let Some(pair) = pair {
                self.paste(&mut frame, &pair.source, face)?;
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_descriptor::BoundingBox;
    use crate::mapping::domain::face_map::{FaceMapRegistry, MappedPair};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::processing::domain::processor_chain::ProcessorChain;

    struct StubAnalyser {
        faces: Vec<FaceDescriptor>,
    }

    impl FaceAnalyser for StubAnalyser {
        fn detect_faces(
            &self,
            _frame: &Frame,
        ) -> Result<Vec<FaceDescriptor>, Box<dyn std::error::Error>> {
            Ok(self.faces.clone())
        }
    }

    struct FailingAnalyser;

    impl FaceAnalyser for FailingAnalyser {
        fn detect_faces(
            &self,
            _frame: &Frame,
        ) -> Result<Vec<FaceDescriptor>, Box<dyn std::error::Error>> {
            Err("detector crashed".into())
        }
    }

    fn face(x: f32, embedding: Vec<f32>) -> FaceDescriptor {
        FaceDescriptor::new(BoundingBox::new(x, 0.0, x + 10.0, 10.0), 0.9)
            .with_embedding(embedding)
    }

    fn crop(rgb: [u8; 3]) -> FaceCrop {
        FaceCrop {
            image: Frame::filled(5, 5, rgb, 0),
            descriptor: face(0.0, vec![1.0, 0.0]),
        }
    }

    fn analyser(faces: Vec<FaceDescriptor>) -> Arc<dyn FaceAnalyser> {
        Arc::new(StubAnalyser { faces })
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let arr = frame.as_ndarray();
        [arr[[y, x, 0]], arr[[y, x, 1]], arr[[y, x, 2]]]
    }

    fn background() -> Frame {
        Frame::filled(40, 10, [0, 0, 0], 0)
    }

    #[test]
    fn test_single_pastes_left_most_face() {
        let faces = vec![face(20.0, vec![1.0, 0.0]), face(2.0, vec![0.0, 1.0])];
        let mut processor = FacePasteProcessor::new(analyser(faces), 1.0, false);

        let out = processor
            .apply_single(Some(&crop([200, 0, 0])), background())
            .unwrap();

        assert_eq!(pixel(&out, 5, 5), [200, 0, 0]);
        assert_eq!(pixel(&out, 25, 5), [0, 0, 0]);
    }

    #[test]
    fn test_single_many_faces_pastes_every_face() {
        let faces = vec![face(20.0, vec![1.0, 0.0]), face(2.0, vec![0.0, 1.0])];
        let mut processor = FacePasteProcessor::new(analyser(faces), 1.0, true);

        let out = processor
            .apply_single(Some(&crop([200, 0, 0])), background())
            .unwrap();

        assert_eq!(pixel(&out, 5, 5), [200, 0, 0]);
        assert_eq!(pixel(&out, 25, 5), [200, 0, 0]);
    }

    #[test]
    fn test_single_without_source_is_unchanged() {
        let mut processor =
            FacePasteProcessor::new(analyser(vec![face(2.0, vec![1.0, 0.0])]), 1.0, true);
        let out = processor.apply_single(None, background()).unwrap();
        assert_eq!(out, background());
    }

    #[test]
    fn test_opacity_blends() {
        let mut processor =
            FacePasteProcessor::new(analyser(vec![face(2.0, vec![1.0, 0.0])]), 0.5, false);
        let out = processor
            .apply_single(Some(&crop([200, 100, 0])), background())
            .unwrap();
        assert_eq!(pixel(&out, 5, 5), [100, 50, 0]);
    }

    #[test]
    fn test_mapped_pastes_matching_source_only() {
        let faces = vec![
            face(2.0, vec![1.0, 0.0]),
            face(15.0, vec![0.0, 1.0]),
            face(28.0, vec![-1.0, 0.0]),
        ];
        let map = vec![
            MappedPair {
                id: 0,
                source: crop([255, 0, 0]),
                target: face(0.0, vec![0.0, 1.0]),
            },
            MappedPair {
                id: 1,
                source: crop([0, 0, 255]),
                target: face(0.0, vec![1.0, 0.1]),
            },
        ];
        let mut processor = FacePasteProcessor::new(analyser(faces), 1.0, false);

        let out = processor.apply_mapped(&map, background()).unwrap();

        assert_eq!(pixel(&out, 5, 5), [0, 0, 255]);
        assert_eq!(pixel(&out, 20, 5), [255, 0, 0]);
        assert_eq!(pixel(&out, 33, 5), [0, 0, 0]);
    }

    #[test]
    fn test_target_only_entry_leaves_its_face_alone() {
        let faces = vec![face(2.0, vec![1.0, 0.0]), face(15.0, vec![0.0, 1.0])];
        let target = |embedding| FaceCrop {
            image: Frame::filled(5, 5, [0, 0, 0], 0),
            descriptor: face(0.0, embedding),
        };
        let mut registry =
            FaceMapRegistry::from_targets(vec![target(vec![1.0, 0.0]), target(vec![0.0, 1.0])]);
        let source_image = Frame::filled(40, 10, [0, 180, 0], 0);
        registry
            .set_source(0, &source_image, analyser(faces.clone()).as_ref())
            .unwrap();

        let simplified = registry.simplify();
        assert_eq!(simplified.len(), 1);
        assert_eq!(simplified[0].id, 0);

        let mut chain = ProcessorChain::new();
        chain.push(Box::new(FacePasteProcessor::new(analyser(faces), 1.0, false)));
        let out = chain
            .apply_mapped(&registry.shared(), background(), &mut NullPipelineLogger)
            .unwrap();

        assert_eq!(pixel(&out, 5, 5), [0, 180, 0]);
        assert_eq!(pixel(&out, 20, 5), [0, 0, 0]);
    }

    #[test]
    fn test_mapped_with_empty_map_skips_detection() {
        let mut processor = FacePasteProcessor::new(Arc::new(FailingAnalyser), 1.0, false);
        let out = processor.apply_mapped(&Vec::new(), background()).unwrap();
        assert_eq!(out, background());
    }

    #[test]
    fn test_analyser_error_propagates() {
        let mut processor = FacePasteProcessor::new(Arc::new(FailingAnalyser), 1.0, false);
        assert!(processor
            .apply_single(Some(&crop([1, 2, 3])), background())
            .is_err());
    }
}
