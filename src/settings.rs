use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

const DEBUG_IDLE_THRESHOLD_SECS: f64 = 5.0;

/// Thresholds and resource limits for the frame monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Consecutive no-face frames before a `face_missing` event is logged.
    pub missing_face_frame_threshold: u32,
    /// Consecutive no-lip frames before a `no_lip_movement` event is logged.
    pub no_lip_frame_threshold: u32,
    /// Wall-clock inactivity before a session is classified idle.
    pub idle_threshold_secs: f64,
    /// Euclidean distance between consecutive embeddings that flags a proxy.
    pub identity_distance_threshold: f64,
    /// Minimum vertical gap between the inner lip points, in normalized units.
    pub lip_gap_threshold: f64,
    /// Number of leading mesh landmarks that make up the identity embedding.
    pub embedding_landmark_count: usize,
    pub session_ttl_secs: u64,
    pub eviction_interval_secs: u64,
    pub decode_timeout_ms: u64,
    pub perception_timeout_ms: u64,
    pub max_concurrent_inference: usize,
    pub session_shards: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            missing_face_frame_threshold: 3,
            no_lip_frame_threshold: 5,
            idle_threshold_secs: 20.0,
            identity_distance_threshold: 0.15,
            lip_gap_threshold: 0.02,
            embedding_landmark_count: 50,
            session_ttl_secs: 300,
            eviction_interval_secs: 30,
            decode_timeout_ms: 2_000,
            perception_timeout_ms: 5_000,
            max_concurrent_inference: 4,
            session_shards: 16,
        }
    }
}

impl MonitorSettings {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.idle_threshold_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_millis(self.decode_timeout_ms)
    }

    pub fn perception_timeout(&self) -> Duration {
        Duration::from_millis(self.perception_timeout_ms)
    }

    /// Apply `INTERVIEW_MONITOR_DEBUG`, which shortens the idle threshold so
    /// idle transitions can be exercised by hand.
    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var("INTERVIEW_MONITOR_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            self.idle_threshold_secs = DEBUG_IDLE_THRESHOLD_SECS;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.missing_face_frame_threshold == 0 {
            bail!("missing_face_frame_threshold must be greater than zero");
        }
        if self.no_lip_frame_threshold == 0 {
            bail!("no_lip_frame_threshold must be greater than zero");
        }
        if !(self.idle_threshold_secs.is_finite() && self.idle_threshold_secs > 0.0) {
            bail!(
                "idle_threshold_secs must be a positive number, got {}",
                self.idle_threshold_secs
            );
        }
        if !(self.identity_distance_threshold.is_finite() && self.identity_distance_threshold > 0.0)
        {
            bail!("identity_distance_threshold must be a positive number");
        }
        if !(self.lip_gap_threshold.is_finite() && self.lip_gap_threshold > 0.0) {
            bail!("lip_gap_threshold must be a positive number");
        }
        if self.embedding_landmark_count == 0 {
            bail!("embedding_landmark_count must be greater than zero");
        }
        if self.max_concurrent_inference == 0 || self.session_shards == 0 {
            bail!("max_concurrent_inference and session_shards must be greater than zero");
        }
        if self.decode_timeout_ms == 0 || self.perception_timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.session_ttl_secs == 0 {
            bail!("session_ttl_secs must be greater than zero");
        }
        if self.eviction_interval_secs == 0 {
            bail!("eviction_interval_secs must be greater than zero");
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings at {} ({err}); using defaults",
                    path.display()
                );
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };
        data.validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn monitor(&self) -> MonitorSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: MonitorSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: MonitorSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))?;
        data.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
