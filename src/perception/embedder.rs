use crate::error::PerceptionError;
use crate::signals::geometry::normalize;

use super::{IdentityEmbedder, Landmarks};

/// Identity embedding from face-mesh geometry: the first `landmark_count`
/// landmarks flattened to (x, y, z) triples and scaled to unit length.
///
/// Only meaningful for same-face/different-face comparison within one
/// session; it is not a recognition template.
#[derive(Debug, Clone)]
pub struct LandmarkEmbedder {
    landmark_count: usize,
}

impl LandmarkEmbedder {
    pub fn new(landmark_count: usize) -> Self {
        Self { landmark_count }
    }

    pub fn dimensions(&self) -> usize {
        self.landmark_count * 3
    }
}

impl IdentityEmbedder for LandmarkEmbedder {
    fn embed_identity(&self, landmarks: &Landmarks) -> Result<Option<Vec<f64>>, PerceptionError> {
        // Fewer points would give an embedding of a different length, which
        // cannot be compared against the previous frame.
        if landmarks.len() < self.landmark_count {
            return Ok(None);
        }

        let coords: Vec<f64> = landmarks.points[..self.landmark_count]
            .iter()
            .flat_map(|point| point.iter().copied())
            .collect();

        Ok(normalize(coords))
    }
}
