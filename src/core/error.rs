//! Error type shared by the batching and statistics pipeline.

/// Errors surfaced by the ingest pipeline.
///
/// None of these are caught or retried inside the core; they propagate to
/// the caller of the top-level `add_vib`/`add_temp` entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A message lacked a required key.
    MissingField(String),
    /// An average was requested from an aggregate holding no samples.
    EmptyAggregate,
    /// The batch consumer rejected or failed to process a batch.
    Consumer(String),
    /// The persistence sink failed to store a value.
    Persistence(String),
}

impl PipelineError {
    /// Short machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::MissingField(_) => "MISSING_FIELD",
            PipelineError::EmptyAggregate => "EMPTY_AGGREGATE",
            PipelineError::Consumer(_) => "CONSUMER_ERROR",
            PipelineError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::MissingField(key) => write!(f, "Missing field: {key}"),
            PipelineError::EmptyAggregate => write!(f, "Average requested with no samples"),
            PipelineError::Consumer(msg) => write!(f, "Batch consumer error: {msg}"),
            PipelineError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}
