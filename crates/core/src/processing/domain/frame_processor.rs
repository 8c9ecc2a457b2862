use crate::mapping::domain::face_map::{FaceCrop, SimplifiedMap};
use crate::shared::frame::Frame;

/// Domain interface for one pluggable frame transform (face swap, face
/// enhancement, ...).
///
/// A processor consumes the frame and returns the transformed one, which may
/// be the same buffer modified in place. It takes `&mut self` so that
/// implementations can keep scratch buffers or model sessions between frames
/// without interior locking.
pub trait FrameProcessor: Send {
    /// Stable name used in logs, timings and error reports.
    fn name(&self) -> &str;

    /// Single-source mode: every face in the frame takes the `source` face.
    ///
    /// `source` is `None` when no face was found in the source image;
    /// processors then leave the faces they would have swapped untouched.
    fn apply_single(
        &mut self,
        source: Option<&FaceCrop>,
        frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Mapped mode: each detected face takes the source of the entry whose
    /// target it matches.
    fn apply_mapped(
        &mut self,
        map: &SimplifiedMap,
        frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
