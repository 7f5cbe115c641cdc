pub mod controller;
pub mod decision;
pub mod eviction;
pub mod state;
pub mod store;

pub use controller::FrameMonitor;
pub use decision::{decide, Decision};
pub use eviction::EvictionController;
pub use state::{SessionSnapshot, SessionState};
pub use store::SessionStore;
