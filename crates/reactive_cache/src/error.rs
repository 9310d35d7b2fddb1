use std::sync::Arc;

use thiserror::Error;

/// Error produced by an update source.
///
/// Producers report failures with [`anyhow`], the error is shared between every caller that joined
/// the failed update.
pub type ProducerError = Arc<anyhow::Error>;

#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Update source failed: {0:#}")]
    ProducerFailure(ProducerError),

    #[error("Cache has been completed. name: {name}")]
    Completed { name: String },

    #[error("Cache has not been populated yet. name: {name}")]
    NotYetPopulated { name: String },

    #[error("Update source stream has ended without producing a value. name: {name}")]
    SourceExhausted { name: String },

    #[error("Update was abandoned before the source reported a result")]
    Abandoned,
}

impl CacheError {
    pub fn producer_failure(error: anyhow::Error) -> Self {
        Self::ProducerFailure(Arc::new(error))
    }

    pub fn is_producer_failure(&self) -> bool {
        matches!(self, Self::ProducerFailure(_))
    }
}
