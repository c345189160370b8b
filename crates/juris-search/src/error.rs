use thiserror::Error;

/// Failure taxonomy for the query resolution pipeline.
///
/// Every variant except `Store` and `MalformedInput` is recovered locally:
/// the stage that hit it logs the cause and falls back to its degraded path.
/// A store failure surfaces as an empty, successful result set; malformed
/// input is rejected at the boundary before the pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query transformation failed: {0}")]
    Transformation(String),

    #[error("cache backend unavailable: {0}")]
    CacheUnavailable(String),

    #[error("embedding service failed: {0}")]
    Embedding(String),

    #[error("document store failed: {0}")]
    Store(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}
