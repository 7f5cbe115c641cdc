pub mod analysis;
pub mod event;

pub use analysis::{Classification, FaceBox, FrameAnalysis, FrameErrorPayload, FrameResponse};
pub use event::{EventType, InactivityEvent, Severity};
