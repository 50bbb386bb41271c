//! Machine Monitor - vibration and temperature batching for condition monitoring.
//!
//! This library ingests streaming sensor readings for two machines, groups
//! them into fixed-size batches for model inference, and keeps an hourly
//! rolling average of vibration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Machine Monitor                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │  Readings   │──▶│DataController│──▶│ ModelMachine │──▶ consumer
//! │  │ (HTTP/file) │   │  (fan-out)   │   │  (batching)  │      │
//! │  └─────────────┘   └──────────────┘   └──────────────┘      │
//! │                            │                                 │
//! │                            ▼                                 │
//! │                     ┌──────────────┐                         │
//! │                     │  StatModel   │──▶ hourly averages      │
//! │                     │  (per hour)  │                         │
//! │                     └──────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use machine_monitor::core::{DataController, TemperatureMessage, VibrationMessage};
//! use machine_monitor::sink::LogConsumer;
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), machine_monitor::core::PipelineError> {
//! let consumer = Arc::new(LogConsumer::new());
//! let mut controller = DataController::new(consumer, NonZeroUsize::new(2).unwrap(), 1000);
//!
//! controller
//!     .add_vib(&VibrationMessage::new((vec![1.0, 2.0], vec![3.0, 4.0]), (vec![], vec![])))
//!     .await?;
//! controller
//!     .add_temp(&TemperatureMessage::new(vec![5.0, 6.0], vec![]))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod core;
pub mod counters;
pub mod sink;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, InferenceSettings};
pub use core::{
    Batch, BatchConsumer, DataController, HourClock, HourOracle, MachineId, ModelMachine,
    PersistenceSink, PipelineError, StatModel, Statistics,
};
pub use counters::{IngestCounters, IngestStats, SharedCounters};

// Inference re-exports (when enabled)
#[cfg(feature = "inference")]
pub use sink::{InferenceClient, InferenceConfig, InferenceError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
