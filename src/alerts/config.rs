//! Alert policy and state types

use chrono::NaiveTime;

use crate::config::{GuardConfig, DEFAULT_JOB};

/// Gauge value meaning the distributor date is fresh
pub const GAUGE_CLEAR: f64 = 0.0;
/// Gauge value meaning the distributor date is stale
pub const GAUGE_FIRING: f64 = 1.0;

/// When and under which name the staleness alert fires
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    /// Gauge / job name
    pub job: String,
    /// Local time of day from which a stale date raises the alert
    pub alert_after: NaiveTime,
}

impl AlertPolicy {
    /// Create a new policy
    pub fn new(job: impl Into<String>, alert_after: NaiveTime) -> Self {
        Self {
            job: job.into(),
            alert_after,
        }
    }

    /// Set the alert threshold
    pub fn with_alert_after(mut self, alert_after: NaiveTime) -> Self {
        self.alert_after = alert_after;
        self
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            job: DEFAULT_JOB.to_string(),
            alert_after: NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default(),
        }
    }
}

impl From<&GuardConfig> for AlertPolicy {
    fn from(config: &GuardConfig) -> Self {
        Self::new(config.job.clone(), config.alert_after)
    }
}

/// Alert state carried from one check to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    /// An alert was pushed and the dates have not matched since
    pub alerted_today: bool,
}

/// Result of comparing the distributor date against yesterday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Dates match: push 0 and reset the alert
    Clear,
    /// Stale date past the threshold: push 1 and mark alerted
    Fire,
    /// Stale date, but nothing is pushed
    Hold(HoldReason),
}

/// Why a stale date did not raise an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Too early in the day
    BeforeThreshold,
    /// Already alerted, waiting for the dates to match
    AlreadyAlerted,
}

impl Decision {
    /// Gauge value to push, if any
    pub fn gauge_value(&self) -> Option<f64> {
        match self {
            Decision::Clear => Some(GAUGE_CLEAR),
            Decision::Fire => Some(GAUGE_FIRING),
            Decision::Hold(_) => None,
        }
    }

    /// State after acting on this decision
    pub fn apply(&self, state: AlertState) -> AlertState {
        match self {
            Decision::Clear => AlertState {
                alerted_today: false,
            },
            Decision::Fire => AlertState {
                alerted_today: true,
            },
            Decision::Hold(_) => state,
        }
    }
}
