use serde::{Deserialize, Serialize};

/// Per-frame behavioral classification. Every frame is evaluated on its own;
/// none of these states is sticky.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Active,
    /// No face for longer than the idle threshold.
    Idle,
    /// Face present but no speech or expression change for the idle threshold.
    IdleForSubmission,
    /// More than one face in frame.
    Paused,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Active => "active",
            Classification::Idle => "idle",
            Classification::IdleForSubmission => "idle_for_submission",
            Classification::Paused => "paused",
        }
    }
}

/// Face bounding box in pixel coordinates of the decoded frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameAnalysis {
    pub candidate_id: String,
    pub status: Classification,
    pub alert: bool,
    pub reason: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lip_sync: Option<bool>,
    pub face_boxes: Vec<FaceBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameErrorPayload {
    pub candidate_id: String,
    pub error: String,
}

/// What the caller gets back for one frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FrameResponse {
    Analysis(FrameAnalysis),
    Error(FrameErrorPayload),
}

impl FrameResponse {
    pub fn analysis(&self) -> Option<&FrameAnalysis> {
        match self {
            FrameResponse::Analysis(analysis) => Some(analysis),
            FrameResponse::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FrameResponse::Error(_))
    }
}
