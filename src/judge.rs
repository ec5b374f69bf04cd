mod aggregate;
mod dispatch;
mod evaluator;
mod judge0;
mod poller;
mod service;
mod types;

pub use aggregate::{Aggregate, aggregate};
pub use dispatch::{build_requests, dispatch_batch};
pub use evaluator::Evaluator;
pub use judge0::Judge0Client;
pub use poller::{PollPolicy, poll_until_terminal};
pub use service::{ExecutionService, ServiceError};
pub use types::{
    ExecutionRequest, ExecutionToken, ExecutionVerdict, STATUS_ACCEPTED, STATUS_RUNTIME_ERROR,
    StatusCategory, StatusDetail,
};

/// Failures of the evaluation workflow, from language resolution to the last
/// status round.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("no execution service language id for `{0}`")]
    Resolution(String),

    #[error("failed to dispatch batch: {0}")]
    Dispatch(#[source] ServiceError),

    #[error("failed to query batch status: {0}")]
    Poll(#[source] ServiceError),

    #[error("malformed execution service response: {0}")]
    MalformedResponse(String),

    #[error("executions still pending after {rounds} status rounds")]
    PollTimeout { rounds: u32 },

    #[error("evaluation cancelled")]
    Cancelled,
}
