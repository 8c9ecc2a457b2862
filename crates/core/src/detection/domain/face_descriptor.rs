/// Axis-aligned face box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// Integer pixel rectangle clamped to a frame: `(x, y, width, height)`.
pub type PixelRect = (u32, u32, u32, u32);

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x_min.max(other.x_min) as f64;
        let iy1 = self.y_min.max(other.y_min) as f64;
        let ix2 = self.x_max.min(other.x_max) as f64;
        let iy2 = self.y_max.min(other.y_max) as f64;

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.area() as f64 + other.area() as f64 - inter;
        inter / union
    }

    /// Truncates the box to whole pixels inside a `frame_w` x `frame_h` frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn to_pixel_rect(&self, frame_w: u32, frame_h: u32) -> Option<PixelRect> {
        let x1 = self.x_min.max(0.0).floor() as u32;
        let y1 = self.y_min.max(0.0).floor() as u32;
        let x2 = (self.x_max.min(frame_w as f32).floor().max(0.0) as u32).min(frame_w);
        let y2 = (self.y_max.min(frame_h as f32).floor().max(0.0) as u32).min(frame_h);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// Detection result for one face, as produced by a
/// [`super::face_analyser::FaceAnalyser`].
///
/// Treated as immutable once produced. The bounding box drives cropping; the
/// embedding (when the analyser provides one) drives identity matching in
/// mapped mode.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDescriptor {
    pub bbox: BoundingBox,
    pub score: f32,
    pub landmarks: Option<[(f32, f32); 5]>,
    pub embedding: Option<Vec<f32>>,
}

impl FaceDescriptor {
    pub fn new(bbox: BoundingBox, score: f32) -> Self {
        Self {
            bbox,
            score,
            landmarks: None,
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_landmarks(mut self, landmarks: [(f32, f32); 5]) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    /// Cosine similarity between two descriptors' embeddings.
    ///
    /// `None` unless both carry an embedding of the same length.
    pub fn similarity(&self, other: &FaceDescriptor) -> Option<f64> {
        let a = self.embedding.as_ref()?;
        let b = other.embedding.as_ref()?;
        if a.len() != b.len() || a.is_empty() {
            return None;
        }
        let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
        let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return None;
        }
        Some(dot / (norm_a * norm_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_box_geometry() {
        let b = BoundingBox::new(10.0, 20.0, 50.0, 80.0);
        assert_relative_eq!(b.width(), 40.0);
        assert_relative_eq!(b.height(), 60.0);
        assert_relative_eq!(b.area(), 2400.0);
        assert_eq!(b.center(), (30.0, 50.0));
    }

    #[test]
    fn test_inverted_box_has_zero_area() {
        let b = BoundingBox::new(50.0, 50.0, 10.0, 10.0);
        assert_eq!(b.area(), 0.0);
    }

    #[rstest]
    #[case(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 1.0)]
    #[case(BoundingBox::new(50.0, 0.0, 150.0, 100.0), 5000.0 / 15000.0)]
    #[case(BoundingBox::new(200.0, 200.0, 250.0, 250.0), 0.0)]
    #[case(BoundingBox::new(100.0, 0.0, 150.0, 100.0), 0.0)]
    fn test_iou(#[case] other: BoundingBox, #[case] expected: f64) {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        assert_relative_eq!(a.iou(&other), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_pixel_rect_truncates_fractional_coordinates() {
        let b = BoundingBox::new(10.7, 5.2, 30.9, 25.5);
        assert_eq!(b.to_pixel_rect(100, 100), Some((10, 5, 20, 20)));
    }

    #[test]
    fn test_pixel_rect_clamps_to_frame() {
        let b = BoundingBox::new(-5.0, -5.0, 120.0, 60.0);
        assert_eq!(b.to_pixel_rect(100, 50), Some((0, 0, 100, 50)));
    }

    #[test]
    fn test_pixel_rect_outside_frame_is_none() {
        let b = BoundingBox::new(150.0, 150.0, 200.0, 200.0);
        assert_eq!(b.to_pixel_rect(100, 100), None);
    }

    #[test]
    fn test_similarity_requires_embeddings() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let plain = FaceDescriptor::new(bbox, 0.9);
        let embedded = FaceDescriptor::new(bbox, 0.9).with_embedding(vec![1.0, 0.0]);
        assert_eq!(plain.similarity(&embedded), None);
        assert_eq!(embedded.similarity(&plain), None);
    }

    #[test]
    fn test_similarity_of_embeddings() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let a = FaceDescriptor::new(bbox, 0.9).with_embedding(vec![3.0, 4.0]);
        let b = FaceDescriptor::new(bbox, 0.9).with_embedding(vec![0.6, 0.8]);
        let c = FaceDescriptor::new(bbox, 0.9).with_embedding(vec![-4.0, 3.0]);
        assert_relative_eq!(a.similarity(&b).unwrap(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(a.similarity(&c).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_similarity_length_mismatch_is_none() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let a = FaceDescriptor::new(bbox, 0.9).with_embedding(vec![1.0, 0.0]);
        let b = FaceDescriptor::new(bbox, 0.9).with_embedding(vec![1.0, 0.0, 0.0]);
        assert_eq!(a.similarity(&b), None);
    }
}
