use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::clock::Clock;
use crate::error::DecodeError;
use crate::models::{FrameErrorPayload, FrameResponse};
use crate::perception::{decode_frame, DecodedFrame, PerceptionStack};
use crate::settings::MonitorSettings;
use crate::signals::observe_frame;
use crate::sink::EventSink;

use super::decision::decide;
use super::state::SessionSnapshot;
use super::store::SessionStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Turns raw frame bytes into pixels. Runs on the blocking pool.
pub type FrameDecoder = fn(&[u8]) -> Result<DecodedFrame, DecodeError>;

/// Entry point for live frames: decode, perceive, update the session and
/// report. Cheap to clone; clones share models, sessions and sink.
#[derive(Clone)]
pub struct FrameMonitor {
    settings: Arc<MonitorSettings>,
    perception: PerceptionStack,
    sessions: Arc<SessionStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    inference_limiter: Arc<Semaphore>,
    decoder: FrameDecoder,
}

impl FrameMonitor {
    pub fn new(
        settings: MonitorSettings,
        perception: PerceptionStack,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(settings.session_shards)),
            inference_limiter: Arc::new(Semaphore::new(settings.max_concurrent_inference)),
            settings: Arc::new(settings),
            perception,
            sink,
            clock,
            decoder: decode_frame,
        }
    }

    /// Replace the image decoder, e.g. to accept a camera's raw format.
    pub fn with_decoder(mut self, decoder: FrameDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Analyze one frame for `candidate_id`.
    ///
    /// Always returns a well-formed response. Only an undecodable frame yields
    /// the error payload, and it leaves session state untouched.
    pub async fn analyze_frame(&self, candidate_id: &str, frame_bytes: Vec<u8>) -> FrameResponse {
        let started = Instant::now();

        let frame = match self.decode(frame_bytes).await {
            Ok(frame) => Arc::new(frame),
            Err(err) => {
                log_warn!("rejecting frame for {candidate_id}: {err}");
                return FrameResponse::Error(FrameErrorPayload {
                    candidate_id: candidate_id.to_string(),
                    error: format!("Invalid image data: {err}"),
                });
            }
        };

        let observation = observe_frame(
            self.perception.clone(),
            frame,
            self.settings.lip_gap_threshold,
            Arc::clone(&self.inference_limiter),
            self.settings.perception_timeout(),
        )
        .await;

        let decision = {
            let handle = self.sessions.checkout(candidate_id, self.clock.now());
            let mut entry = handle.lock().await;
            let now = self.clock.now();
            entry.last_touched = now;
            decide(&mut entry.state, &observation, now, &self.settings)
        };

        for event in decision.events {
            self.sink.record_event(event);
        }

        log_debug!(
            "frame for {} classified {} (alert={}) in {}ms",
            candidate_id,
            decision.analysis.status.as_str(),
            decision.analysis.alert,
            started.elapsed().as_millis()
        );

        FrameResponse::Analysis(decision.analysis)
    }

    async fn decode(&self, frame_bytes: Vec<u8>) -> Result<DecodedFrame, DecodeError> {
        if frame_bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let timeout = self.settings.decode_timeout();
        let decoder = self.decoder;
        let worker = tokio::task::spawn_blocking(move || decoder(&frame_bytes));
        match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DecodeError::Worker(join_err.to_string())),
            Err(_) => Err(DecodeError::Timeout(self.settings.decode_timeout_ms)),
        }
    }

    /// Drop sessions untouched for longer than the configured TTL, measured
    /// on this monitor's clock.
    pub fn evict_idle_sessions(&self) -> Vec<String> {
        let evicted = self
            .sessions
            .evict_idle(self.clock.now(), self.settings.session_ttl());
        if !evicted.is_empty() {
            log_info!("evicted {} idle session(s): {}", evicted.len(), evicted.join(", "));
        }
        evicted
    }

    /// Forget a finished session. Returns false if it was already gone.
    pub fn end_session(&self, candidate_id: &str) -> bool {
        let removed = self.sessions.remove(candidate_id);
        if removed {
            log_info!("session ended for {candidate_id}");
        }
        removed
    }

    pub async fn session_snapshot(&self, candidate_id: &str) -> Option<SessionSnapshot> {
        let handle = self.sessions.get(candidate_id)?;
        let entry = handle.lock().await;
        Some(entry.state.snapshot())
    }
}
