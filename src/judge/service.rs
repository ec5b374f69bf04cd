use async_trait::async_trait;

use super::types::{ExecutionRequest, ExecutionToken, ExecutionVerdict};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("execution service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("execution service rejected the batch: {0}")]
    Rejected(String),
}

/// Remote service that compiles and runs source code.
///
/// Both calls are order-preserving: the i-th token belongs to the i-th
/// request, and the i-th verdict to the i-th queried token.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn submit_batch(
        &self,
        requests: &[ExecutionRequest],
    ) -> Result<Vec<ExecutionToken>, ServiceError>;

    async fn fetch_batch(
        &self,
        tokens: &[ExecutionToken],
    ) -> Result<Vec<ExecutionVerdict>, ServiceError>;
}
