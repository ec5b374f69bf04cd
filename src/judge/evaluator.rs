use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::EvalError;
use super::aggregate::{Aggregate, aggregate};
use super::dispatch::dispatch_batch;
use super::poller::{PollPolicy, poll_until_terminal};
use super::service::ExecutionService;
use super::types::{ExecutionVerdict, StatusCategory};
use crate::language::Language;
use crate::problem::TestCase;

/// Runs source code against test cases on the execution service.
///
/// Holds the injected execution client and the shutdown token; every
/// evaluation still in its poll loop stops once the token is cancelled.
pub struct Evaluator {
    service: Arc<dyn ExecutionService>,
    policy: PollPolicy,
    shutdown: CancellationToken,
}

impl Evaluator {
    pub fn new(
        service: Arc<dyn ExecutionService>,
        policy: PollPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            policy,
            shutdown,
        }
    }

    /// Dispatches and polls, returning one terminal verdict per case in case order.
    pub async fn run_cases(
        &self,
        language: Language,
        source_code: &str,
        cases: &[TestCase],
    ) -> Result<Vec<ExecutionVerdict>, EvalError> {
        let tokens = dispatch_batch(self.service.as_ref(), language, source_code, cases).await?;
        poll_until_terminal(self.service.as_ref(), &tokens, self.policy, &self.shutdown).await
    }

    pub async fn evaluate(
        &self,
        language: Language,
        source_code: &str,
        cases: &[TestCase],
    ) -> Result<Aggregate, EvalError> {
        let verdicts = self.run_cases(language, source_code, cases).await?;
        Ok(aggregate(&verdicts))
    }

    /// Whether `source_code` is accepted on every case.
    pub async fn passes_all(
        &self,
        language: Language,
        source_code: &str,
        cases: &[TestCase],
    ) -> Result<bool, EvalError> {
        let verdicts = self.run_cases(language, source_code, cases).await?;
        Ok(verdicts
            .iter()
            .all(|v| v.category() == StatusCategory::Accepted))
    }
}
