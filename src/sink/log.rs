//! Batch consumer that only logs what it receives.

use crate::core::{Batch, BatchConsumer, PipelineError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs each batch at `info` and counts them.
#[derive(Debug, Default)]
pub struct LogConsumer {
    batches: AtomicU64,
}

impl LogConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches received so far.
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BatchConsumer for LogConsumer {
    async fn consume(&self, batch: Batch) -> Result<(), PipelineError> {
        let n = self.batches.fetch_add(1, Ordering::Relaxed) + 1;
        let mean_temp = batch.temp.iter().sum::<f64>() / batch.temp.len().max(1) as f64;
        tracing::info!(
            machine = %batch.machine,
            size = batch.len(),
            mean_temp,
            total = n,
            "Batch ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_batches() {
        let consumer = LogConsumer::new();
        let batch = Batch {
            machine: "machine1".to_string(),
            vib_left: vec![0.1],
            vib_right: vec![0.2],
            temp: vec![40.0],
        };

        consumer.consume(batch.clone()).await.unwrap();
        consumer.consume(batch).await.unwrap();
        assert_eq!(consumer.batch_count(), 2);
    }
}
