//! Running sum-of-absolute-values aggregate for a single channel.

use crate::core::error::PipelineError;

/// Accumulates `sum(|x|)` and a sample count between flushes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    data_sum: f64,
    size: usize,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slice of samples. An empty slice leaves the aggregate unchanged.
    pub fn add(&mut self, samples: &[f64]) {
        self.data_sum += samples.iter().map(|x| x.abs()).sum::<f64>();
        self.size += samples.len();
    }

    /// Mean of the absolute values seen so far, without resetting.
    pub fn average(&self) -> Result<f64, PipelineError> {
        if self.size == 0 {
            return Err(PipelineError::EmptyAggregate);
        }
        Ok(self.data_sum / self.size as f64)
    }

    /// Read the mean and reset in one step.
    ///
    /// Fails with [`PipelineError::EmptyAggregate`] when no samples were
    /// added; the aggregate is left untouched in that case.
    pub fn get_average(&mut self) -> Result<f64, PipelineError> {
        let average = self.average()?;
        self.reset();
        Ok(average)
    }

    pub fn reset(&mut self) {
        self.data_sum = 0.0;
        self.size = 0;
    }

    pub fn sum(&self) -> f64 {
        self.data_sum
    }

    pub fn count(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
