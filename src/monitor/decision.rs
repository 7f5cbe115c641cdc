//! Per-frame classification over session state.
//!
//! Two independent debouncers run side by side: consecutive-frame counters
//! that rate-limit audit events, and wall-clock timers that drive the
//! user-visible idle classifications. Checks run in priority order and the
//! first terminal one wins:
//!
//! 1. more than one face: `paused`, nothing else is touched
//! 2. no face: missing-face counter, then the no-face idle timer
//! 3. face found: identity drift against the previous embedding
//! 4. expression change and lip movement: the no-engagement idle timer
//! 5. otherwise `active`

use std::time::{Duration, Instant};

use crate::models::{Classification, EventType, FrameAnalysis, InactivityEvent, Severity};
use crate::settings::MonitorSettings;
use crate::signals::geometry::euclidean_distance;
use crate::signals::FrameObservation;

use super::state::SessionState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Outcome of one frame: the caller-facing analysis plus audit events to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub analysis: FrameAnalysis,
    pub events: Vec<InactivityEvent>,
}

pub fn decide(
    state: &mut SessionState,
    obs: &FrameObservation,
    now: Instant,
    settings: &MonitorSettings,
) -> Decision {
    let candidate_id = state.candidate_id.clone();
    let idle_threshold = settings.idle_threshold();
    let mut events = Vec::new();

    if obs.has_multiple_faces() {
        events.push(InactivityEvent::new(
            &candidate_id,
            EventType::ProxyDetected,
            format!("Multiple faces detected ({} in frame)", obs.face_count()),
            Severity::Critical,
            obs.face_count() as u32,
        ));
        return Decision {
            analysis: FrameAnalysis {
                candidate_id,
                status: Classification::Paused,
                alert: true,
                reason: "Multiple faces detected".to_string(),
                expression: obs.expression.clone(),
                lip_sync: None,
                face_boxes: obs.face_boxes.clone(),
                identity_distance: None,
            },
            events,
        };
    }

    let mut identity_distance = None;
    let mut is_proxy = false;

    if !obs.face_present {
        state.consecutive_missing_faces += 1;
        if state.consecutive_missing_faces >= settings.missing_face_frame_threshold {
            events.push(InactivityEvent::new(
                &candidate_id,
                EventType::FaceMissing,
                format!(
                    "No face detected {} consecutive frames",
                    state.consecutive_missing_faces
                ),
                Severity::Warning,
                state.consecutive_missing_faces,
            ));
            state.consecutive_missing_faces = 0;
        }

        let absent_for = now.saturating_duration_since(state.last_face_seen_at);
        if absent_for > idle_threshold {
            let reason = format!("No face detected for {}", format_secs(absent_for));
            events.push(InactivityEvent::new(
                &candidate_id,
                EventType::IdleDetected,
                reason.clone(),
                Severity::Warning,
                0,
            ));
            state.last_face_seen_at = now;
            return Decision {
                analysis: FrameAnalysis {
                    candidate_id,
                    status: Classification::Idle,
                    alert: false,
                    reason,
                    expression: obs.expression.clone(),
                    lip_sync: Some(obs.lip_movement),
                    face_boxes: obs.face_boxes.clone(),
                    identity_distance: None,
                },
                events,
            };
        }
    } else {
        state.mark_face_seen(now);

        if let Some(current) = &obs.embedding {
            if let Some(previous) = &state.last_identity_embedding {
                match euclidean_distance(current, previous) {
                    Some(distance) => {
                        log_debug!("identity distance for {candidate_id}: {distance:.4}");
                        identity_distance = Some(distance);
                        if distance > settings.identity_distance_threshold {
                            is_proxy = true;
                            events.push(InactivityEvent::new(
                                &candidate_id,
                                EventType::ProxyDetected,
                                format!("Proxy face detected (distance={distance:.2})"),
                                Severity::Critical,
                                0,
                            ));
                        }
                    }
                    None => log_warn!(
                        "embedding size changed for {candidate_id} ({} -> {}); skipping identity check",
                        previous.len(),
                        current.len()
                    ),
                }
            }
            state.last_identity_embedding = Some(current.clone());
        }
    }

    state.observe_expression(&obs.expression, now);

    if obs.lip_movement {
        state.mark_lip_movement(now);
    } else {
        state.consecutive_no_lip_frames += 1;
        if state.consecutive_no_lip_frames >= settings.no_lip_frame_threshold {
            events.push(InactivityEvent::new(
                &candidate_id,
                EventType::NoLipMovement,
                format!(
                    "No lip movement for {} frames",
                    state.consecutive_no_lip_frames
                ),
                Severity::Info,
                state.consecutive_no_lip_frames,
            ));
            state.consecutive_no_lip_frames = 0;
        }

        let inactive_for = now.saturating_duration_since(state.last_engagement_at());
        if inactive_for > idle_threshold {
            let reason = format!(
                "No speech or expression change for {}",
                format_secs(inactive_for)
            );
            events.push(InactivityEvent::new(
                &candidate_id,
                EventType::IdleDetected,
                reason.clone(),
                Severity::Warning,
                0,
            ));
            state.reset_engagement(now);
            return Decision {
                analysis: FrameAnalysis {
                    candidate_id,
                    status: Classification::IdleForSubmission,
                    alert: is_proxy,
                    reason,
                    expression: obs.expression.clone(),
                    lip_sync: Some(false),
                    face_boxes: obs.face_boxes.clone(),
                    identity_distance,
                },
                events,
            };
        }
    }

    let reason = match identity_distance {
        Some(distance) if is_proxy => format!("Proxy detected (distance={distance:.2})"),
        _ if !obs.face_present => "No face detected".to_string(),
        _ => "OK".to_string(),
    };

    Decision {
        analysis: FrameAnalysis {
            candidate_id,
            status: Classification::Active,
            alert: is_proxy,
            reason,
            expression: obs.expression.clone(),
            lip_sync: Some(obs.lip_movement),
            face_boxes: obs.face_boxes.clone(),
            identity_distance,
        },
        events,
    }
}

fn format_secs(duration: Duration) -> String {
    format!("{:.0}s", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::UNKNOWN_EXPRESSION;
    use crate::signals::geometry::normalize;
    use crate::testing::face_box;

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    fn embedding(identity: f64) -> Vec<f64> {
        normalize(vec![1.0, identity, 0.5]).unwrap()
    }

    fn face(identity: f64, speaking: bool, expression: &str) -> FrameObservation {
        FrameObservation {
            face_boxes: vec![face_box(10.0)],
            face_present: true,
            lip_movement: speaking,
            expression: expression.to_string(),
            embedding: Some(embedding(identity)),
        }
    }

    fn no_face() -> FrameObservation {
        FrameObservation {
            expression: "neutral".to_string(),
            ..FrameObservation::empty()
        }
    }

    fn two_faces() -> FrameObservation {
        FrameObservation {
            face_boxes: vec![face_box(10.0), face_box(300.0)],
            ..FrameObservation::empty()
        }
    }

    fn event_types(decision: &Decision) -> Vec<EventType> {
        decision.events.iter().map(|e| e.event_type).collect()
    }

    struct Session {
        state: SessionState,
        t0: Instant,
        settings: MonitorSettings,
    }

    impl Session {
        fn new() -> Self {
            let t0 = Instant::now();
            Self {
                state: SessionState::new("cand-1", t0),
                t0,
                settings: MonitorSettings::default(),
            }
        }

        fn at(&mut self, seconds: f64, obs: FrameObservation) -> Decision {
            decide(&mut self.state, &obs, self.t0 + secs(seconds), &self.settings)
        }
    }

    #[test]
    fn steady_speaking_candidate_stays_active() {
        let mut session = Session::new();
        for i in 0..120 {
            let decision = session.at(i as f64, face(1.0, true, "neutral"));
            assert_eq!(decision.analysis.status, Classification::Active);
            assert!(!decision.analysis.alert);
            assert_eq!(decision.analysis.reason, "OK");
            assert!(decision.events.is_empty(), "frame {i}: {:?}", decision.events);
        }
    }

    #[test]
    fn three_missing_frames_log_face_missing_once_and_reset() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));

        assert!(session.at(1.0, no_face()).events.is_empty());
        assert!(session.at(2.0, no_face()).events.is_empty());
        let third = session.at(3.0, no_face());

        assert_eq!(event_types(&third), vec![EventType::FaceMissing]);
        assert_eq!(third.events[0].severity, Severity::Warning);
        assert_eq!(third.events[0].frame_count, 3);
        assert_eq!(session.state.consecutive_missing_faces, 0);
        assert_eq!(third.analysis.status, Classification::Active);
        assert_eq!(third.analysis.reason, "No face detected");
    }

    #[test]
    fn face_reappearing_resets_missing_counter() {
        let mut session = Session::new();
        session.at(0.0, no_face());
        session.at(1.0, no_face());
        session.at(2.0, face(1.0, true, "neutral"));
        assert_eq!(session.state.consecutive_missing_faces, 0);

        assert!(session.at(3.0, no_face()).events.is_empty());
        assert!(session.at(4.0, no_face()).events.is_empty());
    }

    #[test]
    fn sustained_absence_is_idle_and_resets_face_timer() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));

        let decision = session.at(20.001, no_face());
        assert_eq!(decision.analysis.status, Classification::Idle);
        assert!(!decision.analysis.alert);
        assert_eq!(decision.analysis.expression, "neutral");
        assert_eq!(event_types(&decision), vec![EventType::IdleDetected]);
        assert_eq!(session.state.last_face_seen_at, session.t0 + secs(20.001));

        // Face timer restarted: the next absent frame is not `idle` again.
        let next = session.at(21.0, no_face());
        assert_ne!(next.analysis.status, Classification::Idle);
        assert_eq!(session.state.last_face_seen_at, session.t0 + secs(20.001));
    }

    #[test]
    fn absence_exactly_at_threshold_is_not_idle() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));
        let decision = session.at(20.0, no_face());
        assert_ne!(decision.analysis.status, Classification::Idle);
    }

    #[test]
    fn frame_counter_and_idle_timer_fire_independently() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));
        session.at(21.0, no_face());
        session.at(22.0, no_face());

        let decision = session.at(45.0, no_face());
        assert_eq!(
            event_types(&decision),
            vec![EventType::FaceMissing, EventType::IdleDetected]
        );
        assert_eq!(decision.analysis.status, Classification::Idle);
    }

    #[test]
    fn identity_drift_raises_proxy_alert() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));

        let decision = session.at(1.0, face(5.0, true, "neutral"));
        assert!(decision.analysis.alert);
        assert_eq!(decision.analysis.status, Classification::Active);
        assert!(decision.analysis.reason.starts_with("Proxy detected (distance="));
        assert_eq!(event_types(&decision), vec![EventType::ProxyDetected]);
        assert_eq!(decision.events[0].severity, Severity::Critical);
        assert!(decision.events[0].message.contains("distance="));
        assert!(decision.analysis.identity_distance.unwrap() > 0.15);
    }

    #[test]
    fn proxy_alert_survives_idle_for_submission() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, false, "neutral"));

        let decision = session.at(30.0, face(5.0, false, "neutral"));
        assert_eq!(decision.analysis.status, Classification::IdleForSubmission);
        assert!(decision.analysis.alert);
        assert!(event_types(&decision).contains(&EventType::ProxyDetected));
    }

    #[test]
    fn embedding_is_replaced_after_drift() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));
        session.at(1.0, face(5.0, true, "neutral"));

        // Compared against the new face now, not the original one.
        let decision = session.at(2.0, face(5.0, true, "neutral"));
        assert!(!decision.analysis.alert);
        assert_eq!(session.state.last_identity_embedding, Some(embedding(5.0)));
    }

    #[test]
    fn same_frame_twice_never_alerts() {
        let mut session = Session::new();
        session.at(0.0, face(2.0, true, "neutral"));
        let decision = session.at(0.5, face(2.0, true, "neutral"));
        assert!(!decision.analysis.alert);
        assert_eq!(decision.analysis.identity_distance, Some(0.0));
    }

    #[test]
    fn multiple_faces_pause_without_touching_state() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, false, "neutral"));
        session.at(1.0, no_face());
        let before = session.state.clone();

        let decision = session.at(50.0, two_faces());
        assert_eq!(decision.analysis.status, Classification::Paused);
        assert!(decision.analysis.alert);
        assert_eq!(decision.analysis.lip_sync, None);
        assert_eq!(decision.analysis.face_boxes.len(), 2);
        assert_eq!(event_types(&decision), vec![EventType::ProxyDetected]);
        assert_eq!(decision.events[0].severity, Severity::Critical);

        assert_eq!(session.state.consecutive_missing_faces, before.consecutive_missing_faces);
        assert_eq!(session.state.consecutive_no_lip_frames, before.consecutive_no_lip_frames);
        assert_eq!(session.state.last_face_seen_at, before.last_face_seen_at);
        assert_eq!(session.state.last_identity_embedding, before.last_identity_embedding);
        assert_eq!(session.state.last_expression_label, before.last_expression_label);
    }

    #[test]
    fn silent_frames_log_no_lip_movement_every_fifth_frame() {
        let mut session = Session::new();
        let mut logged = Vec::new();
        for i in 0..10 {
            let decision = session.at(i as f64, face(1.0, false, "neutral"));
            if decision.events.iter().any(|e| e.event_type == EventType::NoLipMovement) {
                logged.push(i);
                assert_eq!(decision.events[0].severity, Severity::Info);
            }
        }
        assert_eq!(logged, vec![4, 9]);
        assert_eq!(session.state.consecutive_no_lip_frames, 0);
    }

    #[test]
    fn silent_unchanging_face_becomes_idle_for_submission() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));
        session.at(10.0, face(1.0, false, "neutral"));

        let decision = session.at(21.0, face(1.0, false, "neutral"));
        assert_eq!(decision.analysis.status, Classification::IdleForSubmission);
        assert!(!decision.analysis.alert);
        assert_eq!(decision.analysis.lip_sync, Some(false));
        assert!(event_types(&decision).contains(&EventType::IdleDetected));
        assert_eq!(session.state.last_lip_movement_at, session.t0 + secs(21.0));
        assert_eq!(session.state.last_expression_change_at, session.t0 + secs(21.0));
    }

    #[test]
    fn expression_change_rescues_silent_face() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));
        session.at(15.0, face(1.0, false, "happy"));

        let decision = session.at(25.0, face(1.0, false, "happy"));
        assert_eq!(decision.analysis.status, Classification::Active);

        let decision = session.at(36.0, face(1.0, false, "happy"));
        assert_eq!(decision.analysis.status, Classification::IdleForSubmission);
    }

    #[test]
    fn unknown_expression_does_not_count_as_engagement() {
        let mut session = Session::new();
        session.at(0.0, face(1.0, true, "neutral"));
        session.at(10.0, face(1.0, false, UNKNOWN_EXPRESSION));
        session.at(15.0, face(1.0, false, "neutral"));

        let decision = session.at(21.0, face(1.0, false, "neutral"));
        assert_eq!(decision.analysis.status, Classification::IdleForSubmission);
    }

    #[test]
    fn interview_scenario() {
        let mut session = Session::new();

        let first = session.at(0.0, face(1.0, true, "neutral"));
        assert_eq!(first.analysis.status, Classification::Active);
        assert!(!first.analysis.alert);

        let mut face_missing = 0;
        for t in [1.0, 2.0, 3.0] {
            let decision = session.at(t, no_face());
            face_missing += decision
                .events
                .iter()
                .filter(|e| e.event_type == EventType::FaceMissing)
                .count();
        }
        assert_eq!(face_missing, 1);
        assert_eq!(session.state.consecutive_missing_faces, 0);

        let fifth = session.at(21.0, no_face());
        assert_eq!(fifth.analysis.status, Classification::Idle);
    }

    #[test]
    fn thresholds_come_from_settings() {
        let mut session = Session::new();
        session.settings.missing_face_frame_threshold = 2;
        session.settings.idle_threshold_secs = 5.0;
        session.settings.identity_distance_threshold = 0.9;

        session.at(0.0, face(1.0, true, "neutral"));
        assert!(!session.at(1.0, face(5.0, true, "neutral")).analysis.alert);

        session.at(2.0, no_face());
        assert_eq!(event_types(&session.at(3.0, no_face())), vec![EventType::FaceMissing]);
        assert_eq!(session.at(6.5, no_face()).analysis.status, Classification::Idle);
    }
}
