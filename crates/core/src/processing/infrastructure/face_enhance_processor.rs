use std::sync::Arc;

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::mapping::domain::face_map::{FaceCrop, SimplifiedMap};
use crate::processing::domain::frame_processor::FrameProcessor;
use crate::shared::frame::Frame;

use super::gaussian::{self, RoiRect};

pub const FACE_ENHANCE_NAME: &str = "face-enhance";

const DEFAULT_KERNEL_SIZE: usize = 5;
const DEFAULT_AMOUNT: f32 = 0.6;

/// Sharpens every detected face with an unsharp mask.
///
/// Enhancement does not depend on the source face or the map, so both modes
/// behave the same.
pub struct FaceEnhanceProcessor {
    analyser: Arc<dyn FaceAnalyser>,
    kernel: Vec<f32>,
    amount: f32,
    roi: Vec<u8>,
    blurred: Vec<u8>,
    temp: Vec<f32>,
}

impl FaceEnhanceProcessor {
    pub fn new(analyser: Arc<dyn FaceAnalyser>) -> Self {
        Self::with_strength(analyser, DEFAULT_KERNEL_SIZE, DEFAULT_AMOUNT)
    }

    /// `kernel_size` is forced odd.
    pub fn with_strength(analyser: Arc<dyn FaceAnalyser>, kernel_size: usize, amount: f32) -> Self {
        Self {
            analyser,
            kernel: gaussian::gaussian_kernel_1d(kernel_size.max(1) | 1),
            amount,
            roi: Vec::new(),
            blurred: Vec::new(),
            temp: Vec::new(),
        }
    }

    fn enhance(&mut self, mut frame: Frame) -> Result<Frame, Box<dyn std::error::Error>> {
        let faces = self.analyser.detect_faces(&frame)?;
        let fw = frame.width() as usize;
        let (width, height) = frame.dimensions();
        let channels = frame.channels() as usize;

        for face in &faces {
            let Some((x, y, w, h)) = face.bbox.to_pixel_rect(width, height) else {
                continue;
            };
            let rect = RoiRect {
                x: x as usize,
                y: y as usize,
                w: w as usize,
                h: h as usize,
            };
            let data = frame.data_mut();
            gaussian::extract_roi(data, fw, channels, rect, &mut self.roi);
            self.blurred.clear();
            self.blurred.extend_from_slice(&self.roi);
            gaussian::separable_gaussian_blur_with_kernel(
                &mut self.blurred,
                rect.w,
                rect.h,
                channels,
                &self.kernel,
                &mut self.temp,
            );
            gaussian::unsharp_mask(&mut self.roi, &self.blurred, self.amount);
            gaussian::write_roi_back(data, &self.roi, fw, channels, rect);
        }
        Ok(frame)
    }
}

impl FrameProcessor for FaceEnhanceProcessor {
    fn name(&self) -> &str {
        FACE_ENHANCE_NAME
    }

    fn apply_single(
        &mut self,
        _source: Option<&FaceCrop>,
        frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        self.enhance(frame)
    }

    fn apply_mapped(
        &mut self,
        _map: &SimplifiedMap,
        frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        self.enhance(frame)
    }
}
