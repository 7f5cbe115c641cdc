//! Offline replay of a recorded interview through the live monitor.
//!
//! A manifest pairs each captured frame with the perception results to use
//! for it, so a session can be re-run deterministically against different
//! thresholds. Time comes from the manifest, not the wall clock, and idle
//! sessions are swept against manifest time before every frame.

pub mod manifest;

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use crate::clock::ManualClock;
use crate::db::Database;
use crate::models::FrameResponse;
use crate::monitor::FrameMonitor;
use crate::perception::ScriptedPerception;
use crate::settings::{MonitorSettings, SettingsStore};
use crate::sink::{DatabaseSink, EventSink, LogSink};

pub use manifest::{Manifest, ManifestEntry};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const USAGE: &str =
    "usage: interview-monitor <manifest.jsonl> [--db <path>] [--settings <path>] [--dry-run]";

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOptions {
    pub manifest: PathBuf,
    pub db_path: PathBuf,
    pub settings_path: Option<PathBuf>,
    pub dry_run: bool,
}

impl ReplayOptions {
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut manifest = None;
        let mut db_path = None;
        let mut settings_path = None;
        let mut dry_run = false;

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = args.next().ok_or_else(|| anyhow!("--db needs a path\n{USAGE}"))?;
                    db_path = Some(PathBuf::from(value));
                }
                "--settings" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--settings needs a path\n{USAGE}"))?;
                    settings_path = Some(PathBuf::from(value));
                }
                "--dry-run" => dry_run = true,
                "-h" | "--help" => bail!("{USAGE}"),
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                path => {
                    if manifest.replace(PathBuf::from(path)).is_some() {
                        bail!("only one manifest may be given\n{USAGE}");
                    }
                }
            }
        }

        let manifest = manifest.ok_or_else(|| anyhow!("missing manifest\n{USAGE}"))?;
        let db_path = db_path.unwrap_or_else(|| manifest.with_extension("events.sqlite3"));

        Ok(Self {
            manifest,
            db_path,
            settings_path,
            dry_run,
        })
    }
}

/// Totals over one replay run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub frames: usize,
    pub rejected_frames: usize,
    pub alerts: usize,
    pub evicted_sessions: usize,
    pub classifications: HashMap<String, usize>,
}

impl ReplaySummary {
    fn record(&mut self, response: &FrameResponse) {
        self.frames += 1;
        match response {
            FrameResponse::Analysis(analysis) => {
                if analysis.alert {
                    self.alerts += 1;
                }
                *self
                    .classifications
                    .entry(analysis.status.as_str().to_string())
                    .or_default() += 1;
            }
            FrameResponse::Error(_) => self.rejected_frames += 1,
        }
    }
}

fn load_settings(options: &ReplayOptions) -> Result<MonitorSettings> {
    let settings = match &options.settings_path {
        Some(path) => SettingsStore::new(path.clone())?.monitor(),
        None => MonitorSettings::default(),
    };
    let settings = settings.with_env_overrides();
    settings.validate()?;
    Ok(settings)
}

/// Replay every manifest frame in capture order, writing one JSON response
/// per line to `out`.
pub async fn run_replay<W: Write>(options: &ReplayOptions, out: &mut W) -> Result<ReplaySummary> {
    let settings = load_settings(options)?;
    let manifest = Manifest::load(&options.manifest)?;

    let sink: Arc<dyn EventSink> = if options.dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(DatabaseSink::new(Database::new(options.db_path.clone())?))
    };

    let clock = Arc::new(ManualClock::new());
    let script = Arc::new(ScriptedPerception::new());
    let monitor = FrameMonitor::new(
        settings.clone(),
        script.stack(settings.embedding_landmark_count),
        sink,
        clock.clone(),
    );

    log_info!(
        "replaying {} frame(s) from {}",
        manifest.entries.len(),
        options.manifest.display()
    );

    let mut summary = ReplaySummary::default();
    for entry in &manifest.entries {
        let path = manifest.frame_path(entry);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                log_warn!("could not read frame {}: {err}", path.display());
                Vec::new()
            }
        };

        clock.set_offset(Duration::from_millis(entry.at_ms));
        summary.evicted_sessions += monitor.evict_idle_sessions().len();
        script.set_next(entry.script());
        let response = monitor.analyze_frame(&entry.candidate_id, bytes).await;

        serde_json::to_writer(&mut *out, &response).context("failed to write response")?;
        writeln!(out).context("failed to write response")?;
        summary.record(&response);

        if entry.end_session {
            monitor.end_session(&entry.candidate_id);
        }
    }

    log_info!(
        "replay finished: {} frames, {} rejected, {} alerts, {} evicted",
        summary.frames,
        summary.rejected_frames,
        summary.alerts,
        summary.evicted_sessions
    );
    Ok(summary)
}
