//! Batch consumers and persistence sinks.
//!
//! - [`LogConsumer`]: logs batches; used when no inference service is configured
//! - [`JsonlStore`]: appends hourly averages to a JSON-lines file
//! - [`MemoryStore`]: keeps hourly averages in memory
//! - `InferenceClient`: forwards batches to a model service (feature `inference`)

pub mod log;
pub mod store;

#[cfg(feature = "inference")]
pub mod inference;

pub use log::LogConsumer;
pub use store::{HourlyRecord, JsonlStore, MemoryStore};

#[cfg(feature = "inference")]
pub use inference::{InferenceClient, InferenceConfig, InferenceError, InferenceRequest};
