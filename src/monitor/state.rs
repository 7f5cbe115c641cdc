use serde::Serialize;
use std::time::Instant;

use crate::perception::UNKNOWN_EXPRESSION;

/// Mutable behavioral state of one candidate session.
///
/// Owned by the session store and only touched under that session's lock.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub candidate_id: String,
    /// Embedding of the last face seen in this session. Replaced on every
    /// frame with a usable face; never rolled back.
    pub last_identity_embedding: Option<Vec<f64>>,
    pub consecutive_missing_faces: u32,
    pub consecutive_no_lip_frames: u32,
    pub last_face_seen_at: Instant,
    pub last_lip_movement_at: Instant,
    pub last_expression_change_at: Instant,
    pub last_expression_label: Option<String>,
}

impl SessionState {
    pub fn new(candidate_id: impl Into<String>, now: Instant) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            last_identity_embedding: None,
            consecutive_missing_faces: 0,
            consecutive_no_lip_frames: 0,
            last_face_seen_at: now,
            last_lip_movement_at: now,
            last_expression_change_at: now,
            last_expression_label: None,
        }
    }

    pub fn mark_face_seen(&mut self, now: Instant) {
        self.consecutive_missing_faces = 0;
        self.last_face_seen_at = now;
    }

    /// Speaking counts as both speech and engagement.
    pub fn mark_lip_movement(&mut self, now: Instant) {
        self.consecutive_no_lip_frames = 0;
        self.last_lip_movement_at = now;
        self.last_expression_change_at = now;
    }

    /// Record the frame's dominant expression. Returns true when it differs
    /// from the last known one. `unknown` carries no information and is
    /// neither stored nor counted as a change.
    pub fn observe_expression(&mut self, label: &str, now: Instant) -> bool {
        if label == UNKNOWN_EXPRESSION || self.last_expression_label.as_deref() == Some(label) {
            return false;
        }
        self.last_expression_label = Some(label.to_string());
        self.last_expression_change_at = now;
        true
    }

    /// Most recent sign of engagement: speech or an expression change.
    pub fn last_engagement_at(&self) -> Instant {
        self.last_lip_movement_at.max(self.last_expression_change_at)
    }

    pub fn reset_engagement(&mut self, now: Instant) {
        self.last_lip_movement_at = now;
        self.last_expression_change_at = now;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            candidate_id: self.candidate_id.clone(),
            consecutive_missing_faces: self.consecutive_missing_faces,
            consecutive_no_lip_frames: self.consecutive_no_lip_frames,
            has_identity_embedding: self.last_identity_embedding.is_some(),
            last_expression_label: self.last_expression_label.clone(),
        }
    }
}

/// Read-only view of a session's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub candidate_id: String,
    pub consecutive_missing_faces: u32,
    pub consecutive_no_lip_frames: u32,
    pub has_identity_embedding: bool,
    pub last_expression_label: Option<String>,
}
