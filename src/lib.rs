pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod monitor;
pub mod perception;
pub mod replay;
pub mod settings;
pub mod signals;
pub mod sink;
pub mod utils;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::Database;
pub use error::{DecodeError, PerceptionError};
pub use models::{
    Classification, EventType, FaceBox, FrameAnalysis, FrameResponse, InactivityEvent, Severity,
};
pub use monitor::{EvictionController, FrameMonitor, SessionStore};
pub use perception::{
    EmotionClassifier, FaceDetector, IdentityEmbedder, LandmarkEmbedder, LandmarkExtractor,
    Landmarks, PerceptionStack,
};
pub use settings::{MonitorSettings, SettingsStore};
pub use sink::{DatabaseSink, EventSink, LogSink, MemorySink};

use replay::{run_replay, ReplayOptions};

/// Command-line entry point: replay a recorded session manifest.
pub async fn run<I, S>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    utils::init_logging();
    log::info!("Interview monitor starting up...");

    let options = ReplayOptions::from_args(args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = run_replay(&options, &mut out).await?;

    if !options.dry_run {
        log::info!("events written to {}", options.db_path.display());
    }
    log::info!("summary: {}", serde_json::to_string(&summary)?);
    Ok(())
}
