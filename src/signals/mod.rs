//! Per-frame signal extraction.
//!
//! Turns one decoded frame into a [`FrameObservation`]: face boxes, lip
//! movement, dominant expression and identity embedding. Signals are raw and
//! unsmoothed; all temporal logic lives in the monitor.

pub mod geometry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::error::PerceptionError;
use crate::models::FaceBox;
use crate::perception::{DecodedFrame, PerceptionStack, UNKNOWN_EXPRESSION};

use geometry::lips_moving;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Everything the monitor needs to know about one frame. Lives for a single
/// analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub face_boxes: Vec<FaceBox>,
    pub face_present: bool,
    pub lip_movement: bool,
    pub expression: String,
    pub embedding: Option<Vec<f64>>,
}

impl FrameObservation {
    /// What a frame looks like when perception produced nothing usable.
    pub fn empty() -> Self {
        Self {
            face_boxes: Vec::new(),
            face_present: false,
            lip_movement: false,
            expression: UNKNOWN_EXPRESSION.to_string(),
            embedding: None,
        }
    }

    pub fn face_count(&self) -> usize {
        self.face_boxes.len()
    }

    pub fn has_multiple_faces(&self) -> bool {
        self.face_count() > 1
    }
}

/// Run the perception stack over one frame on the calling thread.
///
/// Face detection runs first; a multi-face frame skips landmark, lip,
/// expression and identity work entirely.
pub fn extract_observation(
    stack: &PerceptionStack,
    frame: &DecodedFrame,
    lip_gap_threshold: f64,
) -> FrameObservation {
    let face_boxes = stack.faces(frame);
    if face_boxes.len() > 1 {
        return FrameObservation {
            face_boxes,
            ..FrameObservation::empty()
        };
    }

    let landmarks = stack.landmarks(frame);
    let lip_movement = landmarks
        .as_ref()
        .is_some_and(|points| lips_moving(points, lip_gap_threshold));
    let expression = stack.expression(frame);
    let embedding = landmarks.as_ref().and_then(|points| stack.embedding(points));

    FrameObservation {
        face_present: !face_boxes.is_empty() || landmarks.is_some(),
        face_boxes,
        lip_movement,
        expression,
        embedding,
    }
}

/// Run [`extract_observation`] on the blocking pool, holding an inference
/// permit and bounded by `timeout`. A timeout or crashed worker degrades to
/// [`FrameObservation::empty`].
pub async fn observe_frame(
    stack: PerceptionStack,
    frame: Arc<DecodedFrame>,
    lip_gap_threshold: f64,
    limiter: Arc<Semaphore>,
    timeout: Duration,
) -> FrameObservation {
    let started = Instant::now();
    match run_inference(stack, frame, lip_gap_threshold, limiter, timeout).await {
        Ok(observation) => {
            log_debug!(
                "perception finished in {}ms: faces={}, lips={}, expression={}",
                started.elapsed().as_millis(),
                observation.face_count(),
                observation.lip_movement,
                observation.expression
            );
            observation
        }
        Err(err) => {
            log_warn!("perception degraded to empty observation: {err}");
            FrameObservation::empty()
        }
    }
}

/// The permit moves into the blocking task, so an inference that outlives
/// its caller's timeout keeps its slot until the models return. Waiting for
/// a permit counts against the same timeout.
async fn run_inference(
    stack: PerceptionStack,
    frame: Arc<DecodedFrame>,
    lip_gap_threshold: f64,
    limiter: Arc<Semaphore>,
    timeout: Duration,
) -> Result<FrameObservation, PerceptionError> {
    let inference = async move {
        let permit = match limiter.acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => {
                return Err(PerceptionError::Worker(format!(
                    "inference limiter closed: {err}"
                )))
            }
        };

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            extract_observation(&stack, &frame, lip_gap_threshold)
        })
        .await
        .map_err(|join_err| PerceptionError::Worker(join_err.to_string()))
    };

    match tokio::time::timeout(timeout, inference).await {
        Ok(result) => result,
        Err(_) => Err(PerceptionError::Timeout(timeout.as_millis() as u64)),
    }
}
