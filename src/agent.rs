//! Assembly of the ingest pipeline from configuration, and file replay.

use crate::config::{Config, ConfigError};
use crate::core::{
    BatchConsumer, DataController, HourClock, MachineId, PersistenceSink, PipelineError, Reading,
    StatModel,
};
use crate::counters::IngestCounters;
use crate::sink::LogConsumer;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// Pick the batch consumer for a configuration.
///
/// Batches go to the inference service when one is configured and the
/// `inference` feature is enabled; otherwise they are logged.
pub fn consumer_from_config(config: &Config) -> Result<Arc<dyn BatchConsumer>, ConfigError> {
    #[cfg(feature = "inference")]
    if let Some(ref settings) = config.inference {
        let client = crate::sink::InferenceClient::new(settings.clone().into(), config.sampling_rate)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        tracing::info!(url = %client.config().predict_url(), "Forwarding batches to inference service");
        return Ok(Arc::new(client));
    }

    #[cfg(not(feature = "inference"))]
    if config.inference.is_some() {
        tracing::warn!("Inference settings ignored (inference feature not enabled at compile time)");
    }

    Ok(Arc::new(LogConsumer::new()))
}

/// Build a controller, attaching hourly statistics when `sink` is given.
pub fn controller_from_config(
    config: &Config,
    consumer: Arc<dyn BatchConsumer>,
    sink: Option<Arc<dyn PersistenceSink>>,
) -> Result<DataController, ConfigError> {
    let controller = DataController::new(consumer, config.batch_size()?, config.sampling_rate);

    Ok(match sink {
        Some(sink) => {
            let stat_model = |machine: MachineId| {
                StatModel::new(machine.name(), Box::new(HourClock::new()), sink.clone())
            };
            controller.with_statistics(
                stat_model(MachineId::Machine1),
                stat_model(MachineId::Machine2),
            )
        }
        None => controller,
    })
}

/// Replay errors.
#[derive(Debug)]
pub enum ReplayError {
    /// The file could not be read
    Io(String),
    /// A line was not a valid reading
    Parse { line: usize, message: String },
    /// The pipeline rejected a reading
    Pipeline { line: usize, source: PipelineError },
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "IO error: {e}"),
            ReplayError::Parse { line, message } => write!(f, "Line {line}: {message}"),
            ReplayError::Pipeline { line, source } => write!(f, "Line {line}: {source}"),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Read JSON-lines readings from a file. Blank lines are skipped.
pub fn read_readings(path: &Path) -> Result<Vec<(usize, Reading)>, ReplayError> {
    let file = std::fs::File::open(path).map_err(|e| ReplayError::Io(e.to_string()))?;
    let mut readings = Vec::new();

    for (index, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ReplayError::Io(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let reading = serde_json::from_str(&line).map_err(|e| ReplayError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        readings.push((index + 1, reading));
    }

    Ok(readings)
}

/// Feed readings through the controller in order, stopping at the first failure.
pub async fn replay(
    controller: &mut DataController,
    readings: &[(usize, Reading)],
    counters: &IngestCounters,
) -> Result<(), ReplayError> {
    for (line, reading) in readings {
        let result = match reading {
            Reading::Vibration(message) => controller
                .add_vib(message)
                .await
                .map(|batches| counters.record_vibration(batches)),
            Reading::Temperature(message) => controller
                .add_temp(message)
                .await
                .map(|batches| counters.record_temperature(batches)),
        };

        if let Err(source) = result {
            counters.record_rejected();
            return Err(ReplayError::Pipeline {
                line: *line,
                source,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryStore;
    use std::io::Write;

    #[tokio::test]
    async fn test_replay_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"type": "vibration", "machine1_left": [1, 2], "machine1_right": [3, 4], "machine2_left": [5], "machine2_right": [6]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"type": "temperature", "machine1": [20, 21], "machine2": [30]}}"#
        )
        .unwrap();

        let config = Config {
            batch_size: 2,
            ..Config::default()
        };
        let consumer = Arc::new(LogConsumer::new());
        let store: Arc<dyn PersistenceSink> = Arc::new(MemoryStore::new());
        let mut controller =
            controller_from_config(&config, consumer.clone(), Some(store)).unwrap();
        let counters = IngestCounters::new();

        let readings = read_readings(file.path()).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].0, 3);

        replay(&mut controller, &readings, &counters).await.unwrap();

        assert_eq!(consumer.batch_count(), 1);
        assert_eq!(controller.buffered(MachineId::Machine1), (0, 0, 0));
        assert_eq!(controller.buffered(MachineId::Machine2), (1, 1, 1));
        assert_eq!(counters.snapshot().batches_dispatched, 1);
        assert!(controller.stat_model(MachineId::Machine1).is_some());
    }

    #[tokio::test]
    async fn test_replay_stops_at_missing_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "temperature", "machine1": [20]}}"#).unwrap();

        let config = Config::default();
        let mut controller =
            controller_from_config(&config, Arc::new(LogConsumer::new()), None).unwrap();
        let counters = IngestCounters::new();

        let readings = read_readings(file.path()).unwrap();
        let err = replay(&mut controller, &readings, &counters)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplayError::Pipeline {
                line: 1,
                source: PipelineError::MissingField(_)
            }
        ));
        assert_eq!(counters.snapshot().rejected_messages, 1);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "pressure"}}"#).unwrap();

        let err = read_readings(file.path()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 1, .. }));
    }
}
