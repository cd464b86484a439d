use thiserror::Error;

/// Failure taxonomy for one pipeline run.
///
/// Each variant has a distinct persistence contract: upstream failures
/// leave the stored record untouched, oracle failures are persisted as
/// a `failed` status, and publish failures leave the already-persisted
/// `analyzed` status in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The hosting platform's metadata, diff, or file-listing endpoint
    /// was unreachable or returned an error.
    #[error("upstream host unavailable: {0:#}")]
    UpstreamUnavailable(anyhow::Error),

    /// The analysis service call failed or timed out.
    #[error("analysis service unavailable: {0}")]
    OracleUnavailable(String),

    /// The review post was rejected or unreachable.
    #[error("review publish failed: {0}")]
    PublishFailed(String),

    /// The record store rejected a read or write.
    #[error("record store error: {0:#}")]
    Store(anyhow::Error),
}
