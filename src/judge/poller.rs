use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::EvalError;
use super::service::ExecutionService;
use super::types::{ExecutionToken, ExecutionVerdict};

/// Fixed-interval polling bounded by a number of status rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_rounds: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_rounds: 60,
        }
    }
}

/// Queries the status of every token until all of them are terminal.
///
/// Each round is one batch-status call for the full token list. The loop
/// waits `policy.interval` between rounds, with no backoff. A failed status
/// call aborts immediately; only non-terminal verdicts cause another round.
///
/// # Errors
///
/// - [`EvalError::Poll`] if a status call fails.
/// - [`EvalError::MalformedResponse`] if the verdicts do not line up with the tokens.
/// - [`EvalError::PollTimeout`] after `policy.max_rounds` rounds with work still pending.
/// - [`EvalError::Cancelled`] once `cancel` fires.
pub async fn poll_until_terminal(
    service: &dyn ExecutionService,
    tokens: &[ExecutionToken],
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<ExecutionVerdict>, EvalError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let max_rounds = policy.max_rounds.max(1);
    let mut round = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        round += 1;
        let verdicts = service
            .fetch_batch(tokens)
            .await
            .map_err(EvalError::Poll)?;
        check_alignment(tokens, &verdicts)?;

        let pending = verdicts.iter().filter(|v| !v.is_terminal()).count();
        if pending == 0 {
            log::debug!("All {} executions finished after {round} rounds", tokens.len());
            return Ok(verdicts);
        }

        log::debug!(
            "{pending} of {} executions pending after round {round}",
            tokens.len()
        );

        if round >= max_rounds {
            return Err(EvalError::PollTimeout { rounds: round });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(EvalError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}

fn check_alignment(
    tokens: &[ExecutionToken],
    verdicts: &[ExecutionVerdict],
) -> Result<(), EvalError> {
    if verdicts.len() != tokens.len() {
        return Err(EvalError::MalformedResponse(format!(
            "queried {} tokens but received {} results",
            tokens.len(),
            verdicts.len()
        )));
    }

    for (i, (token, verdict)) in tokens.iter().zip(verdicts).enumerate() {
        if verdict.status_code().is_none() {
            return Err(EvalError::MalformedResponse(format!(
                "result {i} carries no status"
            )));
        }
        // Tokens are only echoed when the service returns full fields
        if let Some(echoed) = &verdict.token
            && echoed != token
        {
            return Err(EvalError::MalformedResponse(format!(
                "result {i} belongs to token {} instead of {}",
                echoed.as_str(),
                token.as_str()
            )));
        }
    }

    Ok(())
}
