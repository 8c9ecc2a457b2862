use crate::detection::domain::face_descriptor::FaceDescriptor;

use super::face_map::{MappedPair, SimplifiedMap};

/// Minimum cosine similarity for a detected face to count as a mapped target.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.4;

/// Pairs each detected face with the mapped target it most resembles.
///
/// The result is parallel to `faces`. A face without an embedding, or whose
/// best similarity stays below `threshold`, maps to `None` and is left alone
/// by the processors.
pub fn match_faces<'a>(
    faces: &[FaceDescriptor],
    map: &'a SimplifiedMap,
    threshold: f64,
) -> Vec<Option<&'a MappedPair>> {
    faces
        .iter()
        .map(|face| best_match(face, map, threshold))
        .collect()
}

fn best_match<'a>(
    face: &FaceDescriptor,
    map: &'a SimplifiedMap,
    threshold: f64,
) -> Option<&'a MappedPair> {
    map.iter()
        .filter_map(|pair| face.similarity(&pair.target).map(|s| (pair, s)))
        .filter(|(_, s)| *s >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(pair, _)| pair)
}
