//! DateGuard probe
//!
//! Run with: dateguard -dsn <postgres dsn> -pushgateway-url <url>
//!
//! Every flag can also be given through the environment:
//! - DATEGUARD_DSN: PostgreSQL connection string (required)
//! - DATEGUARD_PUSHGATEWAY_URL: Pushgateway base URL (required)
//! - DATEGUARD_JOB: Job / gauge name (default: oula_distributor_date_check)
//! - DATEGUARD_INSTANCE: Optional instance grouping label
//! - DATEGUARD_INTERVAL_SECS: Seconds between checks (default: 60)
//! - DATEGUARD_ALERT_AFTER: Local HH:MM from which stale dates alert (default: 08:30)
//! - DATEGUARD_PUSH_TIMEOUT_SECS: Push timeout (default: 10)
//! - DATEGUARD_EXIT_ON_CONNECT_ERROR: Exit when the database is unreachable
//! - RUST_LOG: Log level (default: info)

use dateguard::alerts::{AlertPolicy, DateChecker, DateGuard};
use dateguard::clock::SystemClock;
use dateguard::config::GuardConfig;
use dateguard::push::Pushgateway;
use dateguard::store::PgDateSource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dateguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GuardConfig::from_env_args() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    tracing::info!("DateGuard configuration:");
    tracing::info!("  Database: {}", config.redacted_dsn());
    tracing::info!("  Pushgateway: {}", config.pushgateway_url);
    tracing::info!("  Job: {}", config.job);
    if let Some(instance) = &config.instance {
        tracing::info!("  Instance: {}", instance);
    }
    tracing::info!("  Interval: {} seconds", config.interval.as_secs());
    tracing::info!("  Alert after: {}", config.alert_after.format("%H:%M"));
    if config.exit_on_connect_error {
        tracing::info!("  Database connection failures are fatal");
    }

    let gateway = Pushgateway::new(
        config.pushgateway_url.clone(),
        config.instance.clone(),
        config.push_timeout,
    )?;
    let checker = DateChecker::new(
        AlertPolicy::from(&config),
        Box::new(PgDateSource::new(config.dsn.clone())),
        Box::new(gateway),
        Box::new(SystemClock),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    DateGuard::new(checker, config.interval)
        .with_exit_on_connect_error(config.exit_on_connect_error)
        .run(shutdown)
        .await?;

    Ok(())
}
