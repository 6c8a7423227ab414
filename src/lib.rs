//! DateGuard: distributor date freshness probe
//!
//! Once a minute, reads the most recent `distributor_date` from PostgreSQL and
//! compares it with yesterday's local date. The result is pushed to a
//! Prometheus Pushgateway as a gauge: `0` when the date is fresh, `1` when it
//! is stale past the configured time of day. A stale date alerts once and
//! stays quiet until the dates match again.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use dateguard::alerts::{AlertPolicy, DateChecker, DateGuard};
//! use dateguard::clock::SystemClock;
//! use dateguard::push::Pushgateway;
//! use dateguard::store::PgDateSource;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Pushgateway::new(
//!     "http://localhost:9091".parse()?,
//!     None,
//!     Duration::from_secs(10),
//! )?;
//! let checker = DateChecker::new(
//!     AlertPolicy::default(),
//!     Box::new(PgDateSource::new("postgres://localhost/app")),
//!     Box::new(gateway),
//!     Box::new(SystemClock),
//! );
//! DateGuard::new(checker, Duration::from_secs(60))
//!     .run(std::future::pending())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod clock;
pub mod config;
pub mod push;
pub mod store;

// Re-export commonly used types
pub use alerts::{AlertPolicy, AlertState, DateChecker, DateGuard, Decision};
pub use config::{ConfigError, GuardConfig};
pub use push::{GaugeSink, PushError, Pushgateway};
pub use store::{DateSource, PgDateSource, StoreError};
