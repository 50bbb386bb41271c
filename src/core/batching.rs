//! Fixed-size batching of aligned vibration and temperature channels.
//!
//! Each [`ModelMachine`] buffers three channels (vibration left, vibration
//! right, temperature) for one machine. Once every channel holds at least
//! `batch_size` samples, the first `batch_size` samples of each channel are
//! handed to a [`BatchConsumer`] and then evicted from the front.

use crate::core::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// One aligned slice of samples across the three channels of a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Name of the machine the samples came from
    pub machine: String,
    pub vib_left: Vec<f64>,
    pub vib_right: Vec<f64>,
    pub temp: Vec<f64>,
}

impl Batch {
    /// Number of samples per channel.
    pub fn len(&self) -> usize {
        self.vib_left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vib_left.is_empty()
    }
}

/// Downstream capability that receives completed batches.
///
/// Each channel of the batch holds exactly `batch_size` samples. A failure
/// is propagated to whoever triggered the flush.
#[async_trait]
pub trait BatchConsumer: Send + Sync {
    async fn consume(&self, batch: Batch) -> Result<(), PipelineError>;
}

/// Per-machine batching state machine.
pub struct ModelMachine {
    name: String,
    batch_size: NonZeroUsize,
    vib_left: VecDeque<f64>,
    vib_right: VecDeque<f64>,
    temp: VecDeque<f64>,
    consumer: Arc<dyn BatchConsumer>,
}

impl ModelMachine {
    /// Create a machine with empty buffers.
    pub fn new(
        name: impl Into<String>,
        consumer: Arc<dyn BatchConsumer>,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            name: name.into(),
            batch_size,
            vib_left: VecDeque::new(),
            vib_right: VecDeque::new(),
            temp: VecDeque::new(),
            consumer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Append to the left vibration buffer without checking readiness.
    pub fn add_vib_left(&mut self, data: &[f64]) {
        self.vib_left.extend(data.iter().copied());
    }

    /// Append to the right vibration buffer without checking readiness.
    pub fn add_vib_right(&mut self, data: &[f64]) {
        self.vib_right.extend(data.iter().copied());
    }

    /// Append a vibration pair, then flush one batch if ready.
    ///
    /// Returns whether a batch was dispatched.
    pub async fn add_vib(&mut self, left: &[f64], right: &[f64]) -> Result<bool, PipelineError> {
        self.add_vib_left(left);
        self.add_vib_right(right);
        tracing::debug!(
            machine = %self.name,
            left = left.len(),
            right = right.len(),
            "Appended vibration samples"
        );
        self.trigger().await
    }

    /// Append temperature samples, then flush one batch if ready.
    pub async fn add_temp(&mut self, data: &[f64]) -> Result<bool, PipelineError> {
        self.temp.extend(data.iter().copied());
        tracing::debug!(machine = %self.name, temp = data.len(), "Appended temperature samples");
        self.trigger().await
    }

    /// Check whether every channel holds at least `batch_size` samples.
    pub fn is_batch(&self) -> bool {
        let n = self.batch_size.get();
        self.vib_left.len() >= n && self.temp.len() >= n && self.vib_right.len() >= n
    }

    /// Dispatch at most one batch.
    ///
    /// Buffers are evicted only after the consumer succeeds, so a failed
    /// dispatch leaves the same batch in place for a later call. Surplus
    /// samples beyond one batch wait for the next `add_*` call.
    pub async fn trigger(&mut self) -> Result<bool, PipelineError> {
        if !self.is_batch() {
            return Ok(false);
        }

        let batch = self.snapshot();
        tracing::info!(machine = %self.name, size = batch.len(), "Dispatching batch");
        self.consumer.consume(batch).await?;
        self.clear_batch();

        Ok(true)
    }

    /// Current buffer lengths as `(vib_left, vib_right, temp)`.
    pub fn buffered(&self) -> (usize, usize, usize) {
        (self.vib_left.len(), self.vib_right.len(), self.temp.len())
    }

    fn snapshot(&self) -> Batch {
        let n = self.batch_size.get();
        let head = |buf: &VecDeque<f64>| buf.iter().take(n).copied().collect::<Vec<_>>();

        Batch {
            machine: self.name.clone(),
            vib_left: head(&self.vib_left),
            vib_right: head(&self.vib_right),
            temp: head(&self.temp),
        }
    }

    fn clear_batch(&mut self) {
        let n = self.batch_size.get();
        self.vib_left.drain(..n);
        self.vib_right.drain(..n);
        self.temp.drain(..n);
    }
}
