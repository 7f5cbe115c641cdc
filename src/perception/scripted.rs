use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::PerceptionError;
use crate::models::FaceBox;

use super::{
    DecodedFrame, EmotionClassifier, FaceDetector, LandmarkEmbedder, LandmarkExtractor,
    Landmarks, PerceptionStack,
};

/// Model answers for the next frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameScript {
    #[serde(default)]
    pub faces: Vec<FaceBox>,
    #[serde(default)]
    pub landmarks: Option<Vec<[f64; 3]>>,
    /// `None` makes the classifier fail for this frame.
    #[serde(default)]
    pub emotion: Option<String>,
}

/// Perception adapters that replay caller-supplied answers instead of running
/// models. Answers apply to every call until replaced, so frames must be fed
/// one at a time.
#[derive(Debug, Default)]
pub struct ScriptedPerception {
    current: Mutex<FrameScript>,
}

impl ScriptedPerception {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_next(&self, script: FrameScript) {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = script;
    }

    fn current(&self) -> FrameScript {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// A full stack backed by this script and a [`LandmarkEmbedder`].
    pub fn stack(self: &Arc<Self>, embedding_landmark_count: usize) -> PerceptionStack {
        PerceptionStack::new(
            self.clone(),
            self.clone(),
            self.clone(),
            Arc::new(LandmarkEmbedder::new(embedding_landmark_count)),
        )
    }
}

impl FaceDetector for ScriptedPerception {
    fn detect_faces(&self, _frame: &DecodedFrame) -> Result<Vec<FaceBox>, PerceptionError> {
        Ok(self.current().faces)
    }
}

impl LandmarkExtractor for ScriptedPerception {
    fn extract_landmarks(
        &self,
        _frame: &DecodedFrame,
    ) -> Result<Option<Landmarks>, PerceptionError> {
        Ok(self.current().landmarks.map(Landmarks::new))
    }
}

impl EmotionClassifier for ScriptedPerception {
    fn classify_emotion(&self, _frame: &DecodedFrame) -> Result<String, PerceptionError> {
        self.current()
            .emotion
            .ok_or_else(|| PerceptionError::Model("no emotion scripted for frame".into()))
    }
}
