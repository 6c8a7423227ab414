//! Distributor date checker

use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::config::{AlertPolicy, AlertState, Decision, HoldReason};
use crate::clock::Clock;
use crate::push::GaugeSink;
use crate::store::{DateSource, StoreError};

/// Outcome of one completed check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Expected date (`YYYY-MM-DD`)
    pub yesterday: String,
    /// Date read from the store (`YYYY-MM-DD`)
    pub distributor_date: String,
    /// What was decided
    pub decision: Decision,
    /// State to carry into the next check
    pub state: AlertState,
    /// Whether a push was attempted and failed
    pub push_failed: bool,
}

/// Runs a single date check against a source and a sink
pub struct DateChecker {
    policy: AlertPolicy,
    source: Box<dyn DateSource>,
    sink: Box<dyn GaugeSink>,
    clock: Box<dyn Clock>,
}

impl DateChecker {
    /// Create a new checker
    pub fn new(
        policy: AlertPolicy,
        source: Box<dyn DateSource>,
        sink: Box<dyn GaugeSink>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            source,
            sink,
            clock,
        }
    }

    /// Policy in use
    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Run one check
    ///
    /// On a store error nothing is pushed and the caller keeps its current state.
    /// A failed push is logged; the state still follows the decision.
    pub async fn check(&self, state: AlertState) -> Result<CheckOutcome, StoreError> {
        let yesterday = format_date(yesterday_of(self.clock.now().date()));
        tracing::debug!(%yesterday, "Computed expected distributor date");

        let distributor_date = self.source.latest_date().await?;

        // Time is taken after the query, as the comparison happens then
        let now = self.clock.now();
        tracing::info!(
            %distributor_date,
            now = %now.format("%Y-%m-%d %H:%M:%S"),
            "Fetched latest distributor date"
        );

        let decision = Self::evaluate(&self.policy, &distributor_date, &yesterday, now, state);
        Self::log_decision(&self.policy, decision, &distributor_date, &yesterday);

        let mut push_failed = false;
        if let Some(value) = decision.gauge_value() {
            if let Err(e) = self.sink.push(&self.policy.job, value).await {
                push_failed = true;
                tracing::error!(
                    metric = %self.policy.job,
                    value,
                    error = %e,
                    "Failed to push gauge"
                );
            }
        }

        Ok(CheckOutcome {
            yesterday,
            distributor_date,
            decision,
            state: decision.apply(state),
            push_failed,
        })
    }

    /// Decide what to do for a distributor date at a given local time
    pub fn evaluate(
        policy: &AlertPolicy,
        distributor_date: &str,
        yesterday: &str,
        now: NaiveDateTime,
        state: AlertState,
    ) -> Decision {
        if distributor_date == yesterday {
            return Decision::Clear;
        }
        if now.time() < policy.alert_after {
            return Decision::Hold(HoldReason::BeforeThreshold);
        }
        if state.alerted_today {
            return Decision::Hold(HoldReason::AlreadyAlerted);
        }
        Decision::Fire
    }

    fn log_decision(policy: &AlertPolicy, decision: Decision, actual: &str, expected: &str) {
        match decision {
            Decision::Clear => {
                tracing::info!(date = %actual, "Distributor date matches, clearing alert");
            }
            Decision::Fire => {
                tracing::warn!(
                    expected = %expected,
                    actual = %actual,
                    "Distributor date mismatch, raising alert"
                );
            }
            Decision::Hold(HoldReason::BeforeThreshold) => {
                tracing::info!(
                    expected = %expected,
                    actual = %actual,
                    alert_after = %policy.alert_after.format("%H:%M"),
                    "Distributor date mismatch, before alert time"
                );
            }
            Decision::Hold(HoldReason::AlreadyAlerted) => {
                tracing::info!(
                    expected = %expected,
                    actual = %actual,
                    "Distributor date mismatch, alert already sent"
                );
            }
        }
    }
}

/// The calendar day before `today`
pub fn yesterday_of(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}

/// `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::push::PushError;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use std::sync::{Arc, Mutex};

    struct FakeSource(Result<String, fn() -> StoreError>);

    #[async_trait]
    impl DateSource for FakeSource {
        async fn latest_date(&self) -> Result<String, StoreError> {
            match &self.0 {
                Ok(date) => Ok(crate::store::date_part(date).to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        pushes: Arc<Mutex<Vec<(String, f64)>>>,
        fail: bool,
    }

    #[async_trait]
    impl GaugeSink for RecordingSink {
        async fn push(&self, name: &str, value: f64) -> Result<(), PushError> {
            self.pushes.lock().unwrap().push((name.to_string(), value));
            if self.fail {
                Err(PushError::Request("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn at(date: &str, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn checker(source: FakeSource, sink: &RecordingSink, now: NaiveDateTime) -> DateChecker {
        DateChecker::new(
            AlertPolicy::default(),
            Box::new(source),
            Box::new(sink.clone()),
            Box::new(FixedClock(now)),
        )
    }

    fn ok(date: &str) -> FakeSource {
        FakeSource(Ok(date.to_string()))
    }

    #[test]
    fn test_yesterday_of() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(format_date(yesterday_of(today)), "2024-02-29");

        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(format_date(yesterday_of(today)), "2023-12-31");
    }

    #[test]
    fn test_evaluate_threshold_boundaries() {
        let policy = AlertPolicy::default();
        let quiet = AlertState::default();
        let stale = "2024-04-30";
        let yesterday = "2024-05-01";

        let before = [(0, 0), (8, 0), (8, 29)];
        for (h, m) in before {
            assert_eq!(
                DateChecker::evaluate(&policy, stale, yesterday, at("2024-05-02", h, m), quiet),
                Decision::Hold(HoldReason::BeforeThreshold),
                "{:02}:{:02}",
                h,
                m
            );
        }

        // 09:05 is past 08:30 even though its minute is below 30
        let after = [(8, 30), (8, 40), (9, 5), (23, 59)];
        for (h, m) in after {
            assert_eq!(
                DateChecker::evaluate(&policy, stale, yesterday, at("2024-05-02", h, m), quiet),
                Decision::Fire,
                "{:02}:{:02}",
                h,
                m
            );
        }
    }

    #[test]
    fn test_evaluate_custom_threshold() {
        let policy = AlertPolicy::default().with_alert_after(NaiveTime::from_hms_opt(8, 15, 0).unwrap());
        let decision = DateChecker::evaluate(
            &policy,
            "2024-04-30",
            "2024-05-01",
            at("2024-05-02", 8, 20),
            AlertState::default(),
        );
        assert_eq!(decision, Decision::Fire);
    }

    #[test]
    fn test_evaluate_match_clears_regardless_of_state() {
        let policy = AlertPolicy::default();
        for alerted_today in [false, true] {
            for (h, m) in [(1, 0), (8, 40)] {
                let decision = DateChecker::evaluate(
                    &policy,
                    "2024-05-01",
                    "2024-05-01",
                    at("2024-05-02", h, m),
                    AlertState { alerted_today },
                );
                assert_eq!(decision, Decision::Clear);
            }
        }
    }

    #[tokio::test]
    async fn test_stale_date_after_threshold_fires_once() {
        let sink = RecordingSink::default();
        let checker = checker(ok("2024-04-30T00:00:00"), &sink, at("2024-05-02", 8, 40));

        let first = checker.check(AlertState::default()).await.unwrap();
        assert_eq!(first.yesterday, "2024-05-01");
        assert_eq!(first.distributor_date, "2024-04-30");
        assert_eq!(first.decision, Decision::Fire);
        assert!(first.state.alerted_today);
        assert!(!first.push_failed);

        for _ in 0..3 {
            let next = checker.check(first.state).await.unwrap();
            assert_eq!(next.decision, Decision::Hold(HoldReason::AlreadyAlerted));
            assert!(next.state.alerted_today);
        }

        let pushes = sink.pushes.lock().unwrap().clone();
        assert_eq!(pushes, vec![("oula_distributor_date_check".to_string(), 1.0)]);
    }

    #[tokio::test]
    async fn test_timestamp_suffix_is_ignored() {
        // 2024-05-01T00:00:00 on 2024-05-02 is yesterday once truncated
        let sink = RecordingSink::default();
        let checker = checker(ok("2024-05-01T00:00:00"), &sink, at("2024-05-02", 8, 40));

        let outcome = checker.check(AlertState::default()).await.unwrap();
        assert_eq!(outcome.distributor_date, "2024-05-01");
        assert_eq!(outcome.decision, Decision::Clear);
        assert_eq!(
            sink.pushes.lock().unwrap().clone(),
            vec![("oula_distributor_date_check".to_string(), 0.0)]
        );
    }

    #[tokio::test]
    async fn test_scenario_mismatch_before_threshold() {
        let sink = RecordingSink::default();
        let checker = checker(ok("2024-04-30T00:00:00"), &sink, at("2024-05-02", 8, 0));

        let outcome = checker.check(AlertState::default()).await.unwrap();
        assert_eq!(outcome.decision, Decision::Hold(HoldReason::BeforeThreshold));
        assert!(!outcome.state.alerted_today);
        assert!(sink.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_match_pushes_zero_and_resets() {
        let sink = RecordingSink::default();
        let checker = checker(ok("2024-05-01"), &sink, at("2024-05-02", 10, 0));

        let outcome = checker
            .check(AlertState {
                alerted_today: true,
            })
            .await
            .unwrap();
        assert_eq!(outcome.decision, Decision::Clear);
        assert!(!outcome.state.alerted_today);

        // Every matching check re-pushes the clear value
        let again = checker.check(outcome.state).await.unwrap();
        assert_eq!(again.decision, Decision::Clear);

        let pushes = sink.pushes.lock().unwrap().clone();
        assert_eq!(
            pushes,
            vec![
                ("oula_distributor_date_check".to_string(), 0.0),
                ("oula_distributor_date_check".to_string(), 0.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_error_skips_check() {
        let sink = RecordingSink::default();
        let checker = checker(FakeSource(Err(|| StoreError::NoRows)), &sink, at("2024-05-02", 9, 0));

        let err = checker.check(AlertState::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NoRows));
        assert!(sink.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_still_updates_state() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let checker = checker(ok("2024-04-30"), &sink, at("2024-05-02", 9, 0));

        let outcome = checker.check(AlertState::default()).await.unwrap();
        assert_eq!(outcome.decision, Decision::Fire);
        assert!(outcome.push_failed);
        assert!(outcome.state.alerted_today);
    }
}
