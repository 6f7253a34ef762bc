//! Keep-alive monitor
//!
//! The signaling server reaps sessions that look idle, so a published
//! attachment pings it on a fixed interval. A single failed send must
//! not kill an otherwise healthy publish; the monitor has no backoff
//! and stops only on attachment teardown.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use roomcast_core::KEEPALIVE_INTERVAL_SECS;

use crate::protocol::RoomChannel;

/// Default ping interval.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(KEEPALIVE_INTERVAL_SECS);

/// Periodic liveness ping over an attachment's channel.
#[derive(Default)]
pub struct KeepAlive {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start pinging on `interval`. No-op when already running.
    pub fn start(&self, channel: RoomChannel, interval: Duration) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of an interval fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match channel.keepalive().await {
                    Ok(_) => debug!("keep-alive sent"),
                    Err(e) => warn!("keep-alive send failed: {}", e),
                }
            }
        }));
        debug!("keep-alive started");
    }

    /// Stop the monitor. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            debug!("keep-alive stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.stop();
    }
}
