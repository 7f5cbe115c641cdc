//! Black-box perception adapters and the seam that makes them failure-safe.
//!
//! Models are constructed once and shared read-only across sessions. Each
//! adapter may fail; [`PerceptionStack`] is the only place those failures are
//! turned into safe defaults, so nothing past it ever sees a model error.

pub mod decode;
pub mod embedder;
pub mod scripted;

use std::sync::Arc;

use crate::error::PerceptionError;
use crate::models::FaceBox;

pub use decode::{decode_frame, DecodedFrame};
pub use embedder::LandmarkEmbedder;
pub use scripted::{FrameScript, ScriptedPerception};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const UNKNOWN_EXPRESSION: &str = "unknown";

/// One face-mesh landmark in normalized image coordinates (x, y in 0..1).
pub type Landmark = [f64; 3];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Landmarks {
    pub points: Vec<Landmark>,
}

impl Landmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub trait FaceDetector: Send + Sync {
    fn detect_faces(&self, frame: &DecodedFrame) -> Result<Vec<FaceBox>, PerceptionError>;
}

pub trait LandmarkExtractor: Send + Sync {
    /// Landmarks of the primary face, `None` when no face is found.
    fn extract_landmarks(&self, frame: &DecodedFrame)
        -> Result<Option<Landmarks>, PerceptionError>;
}

pub trait EmotionClassifier: Send + Sync {
    fn classify_emotion(&self, frame: &DecodedFrame) -> Result<String, PerceptionError>;
}

pub trait IdentityEmbedder: Send + Sync {
    /// Unit-length embedding of the face described by `landmarks`.
    fn embed_identity(&self, landmarks: &Landmarks) -> Result<Option<Vec<f64>>, PerceptionError>;
}

#[derive(Clone)]
pub struct PerceptionStack {
    detector: Arc<dyn FaceDetector>,
    landmarks: Arc<dyn LandmarkExtractor>,
    emotion: Arc<dyn EmotionClassifier>,
    embedder: Arc<dyn IdentityEmbedder>,
}

impl PerceptionStack {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        landmarks: Arc<dyn LandmarkExtractor>,
        emotion: Arc<dyn EmotionClassifier>,
        embedder: Arc<dyn IdentityEmbedder>,
    ) -> Self {
        Self {
            detector,
            landmarks,
            emotion,
            embedder,
        }
    }

    /// Detected faces; empty when the detector fails.
    pub fn faces(&self, frame: &DecodedFrame) -> Vec<FaceBox> {
        match self.detector.detect_faces(frame) {
            Ok(boxes) => boxes,
            Err(err) => {
                log_warn!("face detection degraded to empty: {err}");
                Vec::new()
            }
        }
    }

    pub fn landmarks(&self, frame: &DecodedFrame) -> Option<Landmarks> {
        match self.landmarks.extract_landmarks(frame) {
            Ok(Some(landmarks)) if !landmarks.is_empty() => Some(landmarks),
            Ok(_) => None,
            Err(err) => {
                log_warn!("landmark extraction degraded to no face: {err}");
                None
            }
        }
    }

    /// Dominant emotion label, [`UNKNOWN_EXPRESSION`] on failure or blank output.
    pub fn expression(&self, frame: &DecodedFrame) -> String {
        match self.emotion.classify_emotion(frame) {
            Ok(label) if !label.trim().is_empty() => label.trim().to_string(),
            Ok(_) => UNKNOWN_EXPRESSION.to_string(),
            Err(err) => {
                log_warn!("emotion classification degraded to unknown: {err}");
                UNKNOWN_EXPRESSION.to_string()
            }
        }
    }

    pub fn embedding(&self, landmarks: &Landmarks) -> Option<Vec<f64>> {
        match self.embedder.embed_identity(landmarks) {
            Ok(embedding) => embedding,
            Err(err) => {
                log_warn!("identity embedding degraded to absent: {err}");
                None
            }
        }
    }
}
