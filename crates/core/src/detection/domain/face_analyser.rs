use crate::shared::frame::Frame;

use super::face_descriptor::FaceDescriptor;

/// Domain interface for face detection and recognition.
///
/// Shared between the face map editor, the scrub session and the frame
/// processors, hence `&self` and `Sync`; implementations that hold mutable
/// model state guard it internally.
pub trait FaceAnalyser: Send + Sync {
    /// Every face found in the frame, in no particular order.
    fn detect_faces(
        &self,
        frame: &Frame,
    ) -> Result<Vec<FaceDescriptor>, Box<dyn std::error::Error>>;

    /// The left-most face in the frame, if any.
    fn detect_one_face(
        &self,
        frame: &Frame,
    ) -> Result<Option<FaceDescriptor>, Box<dyn std::error::Error>> {
        let faces = self.detect_faces(frame)?;
        Ok(faces.into_iter().min_by(|a, b| {
            a.bbox
                .x_min
                .partial_cmp(&b.bbox.x_min)
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
    }
}
