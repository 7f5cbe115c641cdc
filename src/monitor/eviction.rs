use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;

use super::store::SessionStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Owns the background task that drops abandoned sessions.
pub struct EvictionController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl EvictionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(
        &mut self,
        store: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        ttl: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("session eviction already active");
        }
        if interval.is_zero() || ttl.is_zero() {
            bail!("session eviction needs a non-zero interval and ttl");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(eviction_loop(
            store,
            clock,
            interval,
            ttl,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("eviction loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for EvictionController {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn eviction_loop(
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    ttl: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = store.evict_idle(clock.now(), ttl);
                if evicted.is_empty() {
                    log_debug!("eviction sweep: {} live sessions", store.len());
                } else {
                    log_info!(
                        "evicted {} idle session(s) after {}s: {}",
                        evicted.len(),
                        ttl.as_secs(),
                        evicted.join(", ")
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("eviction loop shutting down");
                break;
            }
        }
    }
}
