//! Startup configuration
//!
//! Parsed once from the command line (with environment fallbacks) and
//! validated into an immutable [`GuardConfig`].

use std::ffi::OsString;
use std::time::Duration;

use chrono::NaiveTime;
use clap::Parser;

/// Default Pushgateway job (also used as the gauge name)
pub const DEFAULT_JOB: &str = "oula_distributor_date_check";

/// Long flags that may also be spelled with a single dash (`-dsn`)
const LEGACY_FLAGS: &[&str] = &[
    "dsn",
    "pushgateway-url",
    "job",
    "instance",
    "interval-secs",
    "alert-after",
    "push-timeout-secs",
    "exit-on-connect-error",
];

/// Legacy flags that take no value
const SWITCH_FLAGS: &[&str] = &["exit-on-connect-error"];

/// Raw command line arguments
#[derive(Debug, Clone, Parser)]
#[command(name = "dateguard", version, about)]
pub struct Args {
    /// PostgreSQL connection string
    #[arg(long, env = "DATEGUARD_DSN", default_value = "", hide_default_value = true)]
    pub dsn: String,

    /// Prometheus Pushgateway base URL
    #[arg(
        long = "pushgateway-url",
        env = "DATEGUARD_PUSHGATEWAY_URL",
        default_value = "",
        hide_default_value = true
    )]
    pub pushgateway_url: String,

    /// Pushgateway job name, also used as the gauge name
    #[arg(long, env = "DATEGUARD_JOB", default_value = DEFAULT_JOB)]
    pub job: String,

    /// Optional `instance` grouping label
    #[arg(long, env = "DATEGUARD_INSTANCE")]
    pub instance: Option<String>,

    /// Seconds to sleep between checks
    #[arg(long = "interval-secs", env = "DATEGUARD_INTERVAL_SECS", default_value_t = 60)]
    pub interval_secs: u64,

    /// Local time of day (HH:MM) from which a stale date raises the alert
    #[arg(long = "alert-after", env = "DATEGUARD_ALERT_AFTER", default_value = "08:30")]
    pub alert_after: String,

    /// Timeout for a single push, in seconds (must be > 0)
    #[arg(long = "push-timeout-secs", env = "DATEGUARD_PUSH_TIMEOUT_SECS", default_value_t = 10)]
    pub push_timeout_secs: u64,

    /// Terminate when the database cannot be reached instead of retrying
    #[arg(long = "exit-on-connect-error", env = "DATEGUARD_EXIT_ON_CONNECT_ERROR")]
    pub exit_on_connect_error: bool,
}

/// Validated guard configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub dsn: String,
    pub pushgateway_url: url::Url,
    pub job: String,
    pub instance: Option<String>,
    pub interval: Duration,
    pub alert_after: NaiveTime,
    pub push_timeout: Duration,
    pub exit_on_connect_error: bool,
}

impl GuardConfig {
    /// Parse and validate the process arguments
    pub fn from_env_args() -> Result<Self, ConfigError> {
        let args = match Args::try_parse_from(normalize_legacy_flags(std::env::args_os())) {
            Ok(args) => args,
            Err(e) if !e.use_stderr() => e.exit(),
            Err(e) => return Err(ConfigError::Args(e.to_string())),
        };
        Self::try_from(args)
    }

    /// Parse and validate an explicit argument list (first item is the binary name)
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = Args::try_parse_from(normalize_legacy_flags(args))
            .map_err(|e| ConfigError::Args(e.to_string()))?;
        Self::try_from(args)
    }

    /// Redacted DSN for logging (password removed)
    pub fn redacted_dsn(&self) -> String {
        match url::Url::parse(&self.dsn) {
            Ok(mut parsed) if parsed.password().is_some() => {
                let _ = parsed.set_password(Some("***"));
                parsed.to_string()
            }
            Ok(parsed) => parsed.to_string(),
            // key=value DSNs are not URLs; do not echo them
            Err(_) => "<dsn>".to_string(),
        }
    }
}

impl TryFrom<Args> for GuardConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let dsn = args.dsn.trim().to_string();
        if dsn.is_empty() {
            return Err(ConfigError::Missing("dsn"));
        }

        let raw_url = args.pushgateway_url.trim();
        if raw_url.is_empty() {
            return Err(ConfigError::Missing("pushgateway-url"));
        }
        let pushgateway_url = url::Url::parse(raw_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
        if pushgateway_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(raw_url.to_string()));
        }

        let job = args.job.trim().to_string();
        if job.is_empty() {
            return Err(ConfigError::Missing("job"));
        }

        if args.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        if args.push_timeout_secs == 0 {
            return Err(ConfigError::ZeroPushTimeout);
        }

        let alert_after = parse_time_of_day(&args.alert_after)?;

        let instance = args
            .instance
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty());

        Ok(Self {
            dsn,
            pushgateway_url,
            job,
            instance,
            interval: Duration::from_secs(args.interval_secs),
            alert_after,
            push_timeout: Duration::from_secs(args.push_timeout_secs),
            exit_on_connect_error: args.exit_on_connect_error,
        })
    }
}

/// Parse an `HH:MM` time of day
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(s.to_string()))
}

/// Rewrite `-dsn value` style flags into `--dsn value`
///
/// Only items in flag position are touched: the value following a
/// value-taking flag, and anything after `--`, is passed through as is.
fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut expects_value = false;
    let mut positional_only = false;

    for arg in args.into_iter().map(Into::into) {
        if expects_value || positional_only {
            expects_value = false;
            out.push(arg);
            continue;
        }

        let Some(s) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if s == "--" {
            positional_only = true;
            out.push(arg);
            continue;
        }

        let (dashes, rest) = match s.strip_prefix("--") {
            Some(rest) => ("--", rest),
            None => match s.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => {
                    out.push(arg);
                    continue;
                }
            },
        };
        let (name, inline_value) = match rest.split_once('=') {
            Some((name, _)) => (name, true),
            None => (rest, false),
        };
        if !LEGACY_FLAGS.contains(&name) {
            out.push(arg);
            continue;
        }

        expects_value = !inline_value && !SWITCH_FLAGS.contains(&name);
        if dashes == "-" {
            out.push(OsString::from(format!("-{}", s)));
        } else {
            out.push(arg);
        }
    }

    out
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Args(String),

    #[error("Required parameter --{0} is empty")]
    Missing(&'static str),

    #[error("Invalid pushgateway URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid time of day (expected HH:MM): {0}")]
    InvalidTime(String),

    #[error("Check interval must be greater than zero")]
    ZeroInterval,

    #[error("Push timeout must be greater than zero")]
    ZeroPushTimeout,
}
