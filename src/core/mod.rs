//! Core ingest pipeline.
//!
//! This module contains:
//! - Fixed-size batching of aligned sensor channels per machine
//! - Hourly rolling statistics with a pluggable hour oracle and sink
//! - Fan-out of typed reading messages to both machines

pub mod batching;
pub mod controller;
pub mod error;
pub mod hourly;
pub mod messages;
pub mod statistics;

// Re-export commonly used types
pub use batching::{Batch, BatchConsumer, ModelMachine};
pub use controller::DataController;
pub use error::PipelineError;
pub use hourly::{HourClock, HourOracle, PersistenceSink, StatModel};
pub use messages::{MachineId, Reading, TemperatureMessage, VibrationMessage};
pub use statistics::Statistics;
