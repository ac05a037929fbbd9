//! Periodic background sweep.
//!
//! One task purges idle rate-limit state and expired sessions on a fixed
//! schedule. The schedule is the only wall-clock element: `sweep_now` runs
//! the identical pass with an explicit timestamp so tests never wait on real
//! time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::SweepConfig;
use crate::security::rate_limit::RateLimiter;
use crate::security::session::SessionManager;
use crate::security::unix_millis;

pub struct Sweeper {
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionManager>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(limiter: Arc<RateLimiter>, sessions: Arc<SessionManager>, config: &SweepConfig) -> Self {
        Self {
            limiter,
            sessions,
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    /// One sweep pass at the current wall clock.
    pub fn sweep_now(&self) {
        self.sweep_at(unix_millis());
    }

    /// One sweep pass at an explicit timestamp.
    pub fn sweep_at(&self, now: u64) {
        let (records, profiles) = self.limiter.sweep_at(now);
        let sessions = self.sessions.sweep_at(now);
        tracing::info!(records, profiles, sessions, "sweep pass complete");
    }

    /// Run on the periodic schedule until the shutdown signal arrives.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "sweeper starting");
        let mut ticker = time::interval(self.interval);
        // the first tick fires immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_now();
                }
                _ = shutdown.recv() => {
                    tracing::info!("sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
