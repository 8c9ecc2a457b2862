use std::sync::{Arc, RwLock};

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::detection::domain::face_descriptor::FaceDescriptor;
use crate::imaging::frame_ops::crop_to_box;
use crate::shared::frame::Frame;
use crate::shared::session_error::SessionError;

/// A face cut out of an image together with the descriptor it was cut from.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceCrop {
    pub image: Frame,
    pub descriptor: FaceDescriptor,
}

impl FaceCrop {
    /// Crops `image` to the descriptor's box; `None` when the box misses the
    /// image entirely.
    pub fn from_image(image: &Frame, descriptor: FaceDescriptor) -> Option<Self> {
        let crop = crop_to_box(image, &descriptor.bbox)?;
        Some(Self {
            image: crop,
            descriptor,
        })
    }

    /// Runs `detect_one_face` on `image` and crops the result.
    pub fn detect(image: &Frame, analyser: &dyn FaceAnalyser) -> Result<Self, SessionError> {
        let face = analyser
            .detect_one_face(image)
            .map_err(|e| SessionError::Detection(e.to_string()))?
            .ok_or(SessionError::NoFaceDetected)?;
        Self::from_image(image, face).ok_or(SessionError::NoFaceDetected)
    }
}

/// One source-to-target pairing in multi-face mode.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceMapEntry {
    pub id: u32,
    pub source: Option<FaceCrop>,
    pub target: Option<FaceCrop>,
}

impl FaceMapEntry {
    pub fn is_complete(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }
}

/// A complete entry reduced to what the processors need.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedPair {
    pub id: u32,
    pub source: FaceCrop,
    pub target: FaceDescriptor,
}

/// Complete entries only, in registry order.
pub type SimplifiedMap = Vec<MappedPair>;

/// The registry as shared between the editing side and a running session.
///
/// Edits take the write guard; the chain holds the read guard for a whole
/// mapped frame, so a frame never sees a half-edited map.
pub type SharedFaceMap = Arc<RwLock<FaceMapRegistry>>;

/// Ordered collection of [`FaceMapEntry`] values.
///
/// Ids are unique and never reused while entries exist: a new entry gets one
/// more than the largest id present, or 0 for an empty registry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceMapRegistry {
    entries: Vec<FaceMapEntry>,
}

impl FaceMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per scanned target face, ids `0..n` in scan order.
    pub fn from_targets(targets: Vec<FaceCrop>) -> Self {
        let entries = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| FaceMapEntry {
                id: i as u32,
                source: None,
                target: Some(target),
            })
            .collect();
        Self { entries }
    }

    pub fn shared(self) -> SharedFaceMap {
        Arc::new(RwLock::new(self))
    }

    pub fn add_blank_entry(&mut self) -> u32 {
        let id = self
            .entries
            .iter()
            .map(|e| e.id + 1)
            .max()
            .unwrap_or(0);
        self.entries.push(FaceMapEntry {
            id,
            source: None,
            target: None,
        });
        id
    }

    /// Detects a face in `image` and stores it as the entry's source.
    ///
    /// On any failure the entry is left exactly as it was.
    pub fn set_source(
        &mut self,
        id: u32,
        image: &Frame,
        analyser: &dyn FaceAnalyser,
    ) -> Result<(), SessionError> {
        self.index_of(id)?;
        let crop = FaceCrop::detect(image, analyser)?;
        let entry = self.entry_mut(id)?;
        entry.source = Some(crop);
        Ok(())
    }

    /// Detects a face in `image` and stores it as the entry's target.
    pub fn set_target(
        &mut self,
        id: u32,
        image: &Frame,
        analyser: &dyn FaceAnalyser,
    ) -> Result<(), SessionError> {
        self.index_of(id)?;
        let crop = FaceCrop::detect(image, analyser)?;
        let entry = self.entry_mut(id)?;
        entry.target = Some(crop);
        Ok(())
    }

    pub fn clear_source(&mut self, id: u32) -> Result<(), SessionError> {
        self.entry_mut(id)?.source = None;
        Ok(())
    }

    pub fn clear_target(&mut self, id: u32) -> Result<(), SessionError> {
        self.entry_mut(id)?.target = None;
        Ok(())
    }

    /// True when at least one entry has both a source and a target.
    pub fn valid(&self) -> bool {
        self.entries.iter().any(FaceMapEntry::is_complete)
    }

    pub fn require_valid(&self) -> Result<(), SessionError> {
        if self.valid() {
            Ok(())
        } else {
            Err(SessionError::NoValidMapping)
        }
    }

    pub fn simplify(&self) -> SimplifiedMap {
        self.entries
            .iter()
            .filter_map(|e| match (&e.source, &e.target) {
                (Some(source), Some(target)) => Some(MappedPair {
                    id: e.id,
                    source: source.clone(),
                    target: target.descriptor.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, id: u32) -> Option<&FaceMapEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[FaceMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn index_of(&self, id: u32) -> Result<usize, SessionError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(SessionError::UnknownEntry(id))
    }

    fn entry_mut(&mut self, id: u32) -> Result<&mut FaceMapEntry, SessionError> {
        let idx = self.index_of(id)?;
        Ok(&mut self.entries[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_descriptor::BoundingBox;

    /// Returns a fixed list of faces for every frame.
    struct StubAnalyser {
        faces: Vec<FaceDescriptor>,
    }

    impl StubAnalyser {
        fn with_face(bbox: BoundingBox) -> Self {
            Self {
                faces: vec![FaceDescriptor::new(bbox, 0.9)],
            }
        }

        fn empty() -> Self {
            Self { faces: vec![] }
        }
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
            Err("model not loaded".into())
        }
    }

    fn image() -> Frame {
        Frame::filled(64, 64, [120, 80, 40], 0)
    }

    fn face_analyser() -> StubAnalyser {
        StubAnalyser::with_face(BoundingBox::new(8.0, 8.0, 40.0, 48.0))
    }

    #[test]
    fn test_new_registry_is_empty_and_invalid() {
        let registry = FaceMapRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.valid());
        assert_eq!(registry.require_valid(), Err(SessionError::NoValidMapping));
    }

    #[test]
    fn test_add_blank_entry_ids_increase() {
        let mut registry = FaceMapRegistry::new();
        assert_eq!(registry.add_blank_entry(), 0);
        assert_eq!(registry.add_blank_entry(), 1);
        assert_eq!(registry.add_blank_entry(), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_ids_are_unique_after_clear_and_readd() {
        let mut registry = FaceMapRegistry::from_targets(vec![]);
        let a = registry.add_blank_entry();
        let b = registry.add_blank_entry();
        assert_ne!(a, b);
        registry.clear();
        assert_eq!(registry.add_blank_entry(), 0);
    }

    #[test]
    fn test_set_source_and_target_make_registry_valid() {
        let mut registry = FaceMapRegistry::new();
        let id = registry.add_blank_entry();
        let analyser = face_analyser();

        registry.set_source(id, &image(), &analyser).unwrap();
        assert!(!registry.valid());

        registry.set_target(id, &image(), &analyser).unwrap();
        assert!(registry.valid());

        let entry = registry.get(id).unwrap();
        let source = entry.source.as_ref().unwrap();
        assert_eq!(source.image.dimensions(), (32, 40));
        let expected = BoundingBox::new(8.0, 8.0, 40.0, 48.0);
        assert_eq!(source.descriptor.bbox, expected);
    }

    #[test]
    fn test_set_source_without_face_leaves_entry_unchanged() {
        let mut registry = FaceMapRegistry::new();
        let id = registry.add_blank_entry();
        registry.set_source(id, &image(), &face_analyser()).unwrap();
        let before = registry.get(id).unwrap().clone();

        let result = registry.set_source(id, &image(), &StubAnalyser::empty());

        assert_eq!(result, Err(SessionError::NoFaceDetected));
        assert_eq!(registry.get(id).unwrap(), &before);
    }

    #[test]
    fn test_face_outside_image_counts_as_no_face() {
        let mut registry = FaceMapRegistry::new();
        let id = registry.add_blank_entry();
        let analyser = StubAnalyser::with_face(BoundingBox::new(100.0, 100.0, 120.0, 120.0));

        assert_eq!(
            registry.set_target(id, &image(), &analyser),
            Err(SessionError::NoFaceDetected)
        );
        assert!(registry.get(id).unwrap().target.is_none());
    }

    #[test]
    fn test_analyser_failure_is_detection_error() {
        let mut registry = FaceMapRegistry::new();
        let id = registry.add_blank_entry();
        let err = registry
            .set_source(id, &image(), &FailingAnalyser)
            .unwrap_err();
        assert!(matches!(err, SessionError::Detection(_)));
        assert!(registry.get(id).unwrap().source.is_none());
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let mut registry = FaceMapRegistry::new();
        assert_eq!(
            registry.set_source(7, &image(), &face_analyser()),
            Err(SessionError::UnknownEntry(7))
        );
        assert_eq!(registry.clear_target(7), Err(SessionError::UnknownEntry(7)));
    }

    #[test]
    fn test_clearing_one_side_invalidates() {
        let mut registry = FaceMapRegistry::new();
        let id = registry.add_blank_entry();
        let analyser = face_analyser();
        registry.set_source(id, &image(), &analyser).unwrap();
        registry.set_target(id, &image(), &analyser).unwrap();

        registry.clear_target(id).unwrap();
        assert!(!registry.valid());
        assert!(registry.get(id).unwrap().source.is_some());

        // clearing an empty side is a no-op
        registry.clear_target(id).unwrap();
        assert!(registry.get(id).unwrap().target.is_none());
    }

    #[test]
    fn test_simplify_keeps_complete_entries_in_order() {
        let analyser = face_analyser();
        let target = FaceCrop::detect(&image(), &analyser).unwrap();
        let targets = vec![target.clone(), target.clone(), target];
        let mut registry = FaceMapRegistry::from_targets(targets);
        registry.set_source(0, &image(), &analyser).unwrap();
        registry.set_source(2, &image(), &analyser).unwrap();

        let simplified = registry.simplify();
        let ids: Vec<u32> = simplified.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!(registry.valid());
    }

    #[test]
    fn test_from_targets_assigns_sequential_ids() {
        let target = FaceCrop::detect(&image(), &face_analyser()).unwrap();
        let mut registry = FaceMapRegistry::from_targets(vec![target.clone(), target]);
        let ids: Vec<u32> = registry.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(!registry.valid());
        assert_eq!(registry.add_blank_entry(), 2);
    }
}
