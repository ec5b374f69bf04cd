use super::EvalError;
use super::service::ExecutionService;
use super::types::{ExecutionRequest, ExecutionToken};
use crate::language::Language;
use crate::problem::TestCase;

/// Builds one request per test case, in test case order.
pub fn build_requests(
    language: Language,
    source_code: &str,
    cases: &[TestCase],
) -> Vec<ExecutionRequest> {
    let language_id = language.judge_id();
    cases
        .iter()
        .map(|case| ExecutionRequest {
            language_id,
            source_code: source_code.to_string(),
            stdin: case.input.clone(),
            expected_output: case.output.clone(),
        })
        .collect()
}

/// Submits every test case as a single batch and returns the tokens aligned
/// with `cases`.
pub async fn dispatch_batch(
    service: &dyn ExecutionService,
    language: Language,
    source_code: &str,
    cases: &[TestCase],
) -> Result<Vec<ExecutionToken>, EvalError> {
    if cases.is_empty() {
        return Ok(Vec::new());
    }

    let requests = build_requests(language, source_code, cases);
    log::debug!(
        "Dispatching batch of {} {language} executions",
        requests.len()
    );

    let tokens = service
        .submit_batch(&requests)
        .await
        .map_err(EvalError::Dispatch)?;

    if tokens.len() != requests.len() {
        return Err(EvalError::MalformedResponse(format!(
            "sent {} executions but received {} tokens",
            requests.len(),
            tokens.len()
        )));
    }

    Ok(tokens)
}
