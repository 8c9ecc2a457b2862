/// Face analyser backed by a YOLO-pose face model and, optionally, an
/// ArcFace embedder.
///
/// Detection is letterbox preprocessing, one inference, confidence filtering
/// and greedy NMS. Each kept face is cropped and embedded when an embedder is
/// attached, so descriptors can be matched across images.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::detection::domain::face_descriptor::{BoundingBox, FaceDescriptor};
use crate::imaging::frame_ops::crop_to_box;
use crate::shared::frame::Frame;
use crate::shared::math::bbox_iou;

use super::arcface_embedder::ArcFaceEmbedder;
use super::execution_provider::build_session;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks x (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct OnnxFaceAnalyser {
    session: Mutex<ort::session::Session>,
    embedder: Option<ArcFaceEmbedder>,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceAnalyser {
    /// Loads the detector. The input resolution is read from the model's
    /// NCHW input shape, falling back to 640 when it is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session: Mutex::new(session),
            embedder: None,
            confidence,
            input_size,
        })
    }

    pub fn with_embedder(mut self, embedder: ArcFaceEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn infer(&self, frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        let letterboxed = letterbox(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(letterboxed.tensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        parse_detections(
            data,
            &shape,
            self.confidence,
            letterboxed.scale,
            (letterboxed.pad_x, letterboxed.pad_y),
        )
    }
}

impl FaceAnalyser for OnnxFaceAnalyser {
    fn detect_faces(
        &self,
        frame: &Frame,
    ) -> Result<Vec<FaceDescriptor>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let mut raw = self.infer(frame)?;
        let kept = nms(&mut raw, NMS_IOU_THRESH);

        let mut faces = Vec::with_capacity(kept.len());
        for det in kept {
            let Some(mut face) = det.to_descriptor(frame.width(), frame.height()) else {
                continue;
            };
            if let Some(embedder) = &self.embedder {
                if let Some(crop) = crop_to_box(frame, &face.bbox) {
                    face = face.with_embedding(embedder.embed(&crop)?);
                }
            }
            faces.push(face);
        }
        log::debug!(
            "Detected {} face(s) in frame {}",
            faces.len(),
            frame.index()
        );
        Ok(faces)
    }
}

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

/// Letterbox-resize a frame to `target_size` x `target_size`, NCHW float32.
fn letterbox(frame: &Frame, target_size: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // padding is 114/255 grey
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    keypoints: Option<[(f64, f64); 5]>,
}

impl RawDetection {
    fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Clamps to the frame; `None` when nothing is left.
    fn to_descriptor(&self, width: u32, height: u32) -> Option<FaceDescriptor> {
        let (w, h) = (width as f64, height as f64);
        let x1 = self.x1.clamp(0.0, w);
        let y1 = self.y1.clamp(0.0, h);
        let x2 = self.x2.clamp(0.0, w);
        let y2 = self.y2.clamp(0.0, h);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        let bbox = BoundingBox::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32);
        let face = FaceDescriptor::new(bbox, self.confidence as f32);
        Some(match self.keypoints {
            Some(points) => face.with_landmarks(points.map(|(x, y)| (x as f32, y as f32))),
            None => face,
        })
    }
}

/// Decodes the model output into frame-space detections above `confidence`.
///
/// Rows are `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`; the tensor
/// may be `[1, features, detections]` or `[1, detections, features]`.
/// Keypoints under the visibility threshold are left at `(0, 0)`.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    scale: f64,
    (pad_x, pad_y): (u32, u32),
) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected face model output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err("face model output is shorter than its shape".into());
    }
    if num_feats < 5 {
        return Ok(Vec::new());
    }

    let (pad_x, pad_y) = (pad_x as f64, pad_y as f64);
    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));

        let keypoints = (num_feats >= 5 + NUM_KEYPOINT_VALUES).then(|| {
            let mut pts = [(0.0f64, 0.0f64); 5];
            for (k, pt) in pts.iter_mut().enumerate() {
                if value(i, 5 + k * 3 + 2) >= KEYPOINT_CONF_THRESH {
                    *pt = (
                        (value(i, 5 + k * 3) - pad_x) / scale,
                        (value(i, 5 + k * 3 + 1) - pad_y) / scale,
                    );
                }
            }
            pts
        });

        dets.push(RawDetection {
            x1: ((cx - w / 2.0) - pad_x) / scale,
            y1: ((cy - h / 2.0) - pad_y) / scale,
            x2: ((cx + w / 2.0) - pad_x) / scale,
            y2: ((cy + h / 2.0) - pad_y) / scale,
            confidence: conf,
            keypoints,
        });
    }
    Ok(dets)
}

/// Greedy NMS: highest confidence first, suppress overlaps above `iou_thresh`.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        if keep
            .iter()
            .all(|kept| bbox_iou(&kept.bbox(), &det.bbox()) <= iou_thresh)
        {
            keep.push(det.clone());
        }
    }
    keep
}
