//! Hourly rolling statistics for a machine.
//!
//! A [`StatModel`] keeps one [`Statistics`] per channel and asks an
//! [`HourOracle`] after every update whether the wall-clock hour has rolled
//! over. On a rollover the left vibration average is written to a
//! [`PersistenceSink`] and the left aggregate is reset. The right and
//! temperature aggregates keep accumulating; only the left channel is
//! flushed.

use crate::core::error::PipelineError;
use crate::core::statistics::Statistics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Reports whether the hour has changed since the previous query.
///
/// Each call advances the oracle's own last-seen marker, so two calls in the
/// same hour after a rollover return `true` then `false`.
pub trait HourOracle: Send {
    fn is_hour_change(&mut self) -> bool;
}

/// [`HourOracle`] backed by the UTC system clock.
#[derive(Debug, Clone)]
pub struct HourClock {
    last_hour: i64,
}

impl HourClock {
    /// Create a clock anchored to the current hour.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a clock anchored to the hour containing `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            last_hour: hour_bucket(start),
        }
    }

    /// Deterministic form of [`HourOracle::is_hour_change`].
    pub fn is_hour_change_at(&mut self, now: DateTime<Utc>) -> bool {
        let hour = hour_bucket(now);
        let changed = hour != self.last_hour;
        self.last_hour = hour;
        changed
    }
}

impl Default for HourClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HourOracle for HourClock {
    fn is_hour_change(&mut self) -> bool {
        self.is_hour_change_at(Utc::now())
    }
}

/// Hours since the Unix epoch.
fn hour_bucket(time: DateTime<Utc>) -> i64 {
    time.timestamp().div_euclid(3600)
}

/// Destination for hourly averages.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn save_now(&self, machine: &str, value: f64) -> Result<(), PipelineError>;
}

/// Per-machine hourly aggregator.
pub struct StatModel {
    name: String,
    left: Statistics,
    right: Statistics,
    temp: Statistics,
    oracle: Box<dyn HourOracle>,
    sink: Arc<dyn PersistenceSink>,
}

impl StatModel {
    pub fn new(
        name: impl Into<String>,
        oracle: Box<dyn HourOracle>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            name: name.into(),
            left: Statistics::new(),
            right: Statistics::new(),
            temp: Statistics::new(),
            oracle,
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feed both vibration channels, then check the hour.
    ///
    /// Returns whether an hourly average was persisted.
    pub async fn add_vib(&mut self, left: &[f64], right: &[f64]) -> Result<bool, PipelineError> {
        self.left.add(left);
        self.right.add(right);
        self.trigger().await
    }

    /// Feed the temperature channel, then check the hour.
    pub async fn add_temp(&mut self, data: &[f64]) -> Result<bool, PipelineError> {
        self.temp.add(data);
        self.trigger().await
    }

    /// Flush if the oracle reports an hour change.
    pub async fn trigger(&mut self) -> Result<bool, PipelineError> {
        if !self.oracle.is_hour_change() {
            return Ok(false);
        }
        self.callback().await
    }

    /// Persist the left-channel average, resetting it once the sink accepts.
    ///
    /// An empty left aggregate is skipped. On sink failure the aggregate is
    /// kept, so the next rollover reports the old and new samples together.
    pub async fn callback(&mut self) -> Result<bool, PipelineError> {
        if self.left.is_empty() {
            tracing::warn!(
                machine = %self.name,
                "Hour changed with no vibration samples, skipping flush"
            );
            return Ok(false);
        }

        let average = self.left.average()?;
        self.sink.save_now(&self.name, average).await?;
        self.left.reset();

        tracing::info!(machine = %self.name, average, "Persisted hourly vibration average");
        Ok(true)
    }

    pub fn left(&self) -> &Statistics {
        &self.left
    }

    pub fn right(&self) -> &Statistics {
        &self.right
    }

    pub fn temp(&self) -> &Statistics {
        &self.temp
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Oracle that replays a fixed script of answers, then reports `false`.
    pub(crate) struct ScriptedOracle(pub VecDeque<bool>);

    impl ScriptedOracle {
        pub(crate) fn new(answers: &[bool]) -> Self {
            Self(answers.iter().copied().collect())
        }
    }

    impl HourOracle for ScriptedOracle {
        fn is_hour_change(&mut self) -> bool {
            self.0.pop_front().unwrap_or(false)
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub saved: Mutex<Vec<(String, f64)>>,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl PersistenceSink for RecordingSink {
        async fn save_now(&self, machine: &str, value: f64) -> Result<(), PipelineError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PipelineError::Persistence("disk full".to_string()));
            }
            self.saved.lock().unwrap().push((machine.to_string(), value));
            Ok(())
        }
    }

    #[test]
    fn test_hour_clock_reports_change_once() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        let mut clock = HourClock::starting_at(start);

        assert!(!clock.is_hour_change_at(start + chrono::Duration::minutes(30)));
        let next = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        assert!(clock.is_hour_change_at(next));
        assert!(!clock.is_hour_change_at(next));
    }

    #[tokio::test]
    async fn test_hour_change_flushes_left_only() {
        let sink = Arc::new(RecordingSink::default());
        let mut model = StatModel::new(
            "machine1",
            Box::new(ScriptedOracle::new(&[true])),
            sink.clone(),
        );

        assert!(model.add_vib(&[3.0, -4.0, 5.0], &[1.0, 1.0]).await.unwrap());

        assert_eq!(*sink.saved.lock().unwrap(), vec![("machine1".to_string(), 4.0)]);
        assert!(model.left().is_empty());
        assert_eq!(model.right().count(), 2);

        // Oracle is exhausted; no further flushes.
        assert!(!model.add_temp(&[20.0]).await.unwrap());
        assert_eq!(model.temp().count(), 1);
        assert_eq!(sink.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_temp_update_can_trigger_flush() {
        let sink = Arc::new(RecordingSink::default());
        let mut model = StatModel::new(
            "machine2",
            Box::new(ScriptedOracle::new(&[false, true])),
            sink.clone(),
        );

        model.add_vib(&[2.0], &[9.0]).await.unwrap();
        assert!(model.add_temp(&[30.0, 31.0]).await.unwrap());

        assert_eq!(*sink.saved.lock().unwrap(), vec![("machine2".to_string(), 2.0)]);
        assert_eq!(model.temp().count(), 2);
    }

    #[tokio::test]
    async fn test_empty_left_skips_flush() {
        let sink = Arc::new(RecordingSink::default());
        let mut model = StatModel::new(
            "machine1",
            Box::new(ScriptedOracle::new(&[true])),
            sink.clone(),
        );

        assert!(!model.add_temp(&[25.0]).await.unwrap());
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_aggregate() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, Ordering::SeqCst);
        let mut model = StatModel::new(
            "machine1",
            Box::new(ScriptedOracle::new(&[true, true])),
            sink.clone(),
        );

        let err = model.add_vib(&[2.0], &[0.0]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
        assert_eq!(model.left().count(), 1);

        sink.fail.store(false, Ordering::SeqCst);
        model.add_vib(&[4.0], &[0.0]).await.unwrap();
        assert_eq!(*sink.saved.lock().unwrap(), vec![("machine1".to_string(), 3.0)]);
        assert!(model.left().is_empty());
    }
}
