//! Poll loop
//!
//! Runs one check, sleeps, repeats. The sleep starts after the check finishes,
//! so the cadence drifts by the query and push latency.

use std::future::Future;
use std::time::Duration;

use super::checker::DateChecker;
use super::config::AlertState;
use crate::store::StoreError;

/// Upper bound on the backoff multiplier after repeated connection failures
const MAX_BACKOFF_FACTOR: u32 = 16;

/// Periodic distributor date guard
pub struct DateGuard {
    checker: DateChecker,
    interval: Duration,
    exit_on_connect_error: bool,
    state: AlertState,
    connect_failures: u32,
}

impl DateGuard {
    /// Create a new guard
    pub fn new(checker: DateChecker, interval: Duration) -> Self {
        Self {
            checker,
            interval,
            exit_on_connect_error: false,
            state: AlertState::default(),
            connect_failures: 0,
        }
    }

    /// Terminate on database connection failures instead of retrying
    pub fn with_exit_on_connect_error(mut self, exit: bool) -> Self {
        self.exit_on_connect_error = exit;
        self
    }

    /// Current alert state
    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), GuardError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            job = %self.checker.policy().job,
            interval_secs = self.interval.as_secs(),
            alert_after = %self.checker.policy().alert_after.format("%H:%M"),
            "Date guard started"
        );

        loop {
            tracing::info!("Starting date check");
            // A check in flight is dropped on shutdown, closing its connection
            let delay = tokio::select! {
                result = self.tick() => result?,
                _ = &mut shutdown => {
                    tracing::info!("Date guard shutting down during check");
                    return Ok(());
                }
            };
            tracing::info!(delay_secs = delay.as_secs(), "Date check finished, waiting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    tracing::info!("Date guard shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Run one check and return how long to wait before the next one
    pub async fn tick(&mut self) -> Result<Duration, GuardError> {
        match self.checker.check(self.state).await {
            Ok(outcome) => {
                self.state = outcome.state;
                self.connect_failures = 0;
            }
            Err(e) if e.is_connect() => {
                if self.exit_on_connect_error {
                    tracing::error!(error = %e, "Cannot reach database, exiting");
                    return Err(GuardError::Store(e));
                }
                self.connect_failures = self.connect_failures.saturating_add(1);
                tracing::error!(
                    error = %e,
                    consecutive_failures = self.connect_failures,
                    "Cannot reach database, skipping check"
                );
            }
            Err(e) => {
                // Reached the database, so connection backoff resets
                self.connect_failures = 0;
                tracing::error!(error = %e, "Failed to read distributor date, skipping check");
            }
        }

        Ok(self.next_delay())
    }

    /// Delay before the next check: the interval, doubled per consecutive
    /// connection failure up to `MAX_BACKOFF_FACTOR`
    pub fn next_delay(&self) -> Duration {
        let factor = match self.connect_failures {
            0 => 1,
            n => 1u32
                .checked_shl(n)
                .unwrap_or(MAX_BACKOFF_FACTOR)
                .min(MAX_BACKOFF_FACTOR),
        };
        self.interval.saturating_mul(factor)
    }
}

/// Fatal guard errors
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}
