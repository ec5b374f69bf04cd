use super::types::{ExecutionVerdict, StatusCategory};
use crate::submission::SubmissionStatus;

/// Reduction of per-case verdicts into one submission outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub status: SubmissionStatus,
    pub passed: u32,
    pub total: u32,
    /// Sum of elapsed seconds over accepted cases
    pub runtime: f64,
    /// Peak kilobytes over accepted cases
    pub memory: u64,
    pub error_message: String,
}

/// Reduces terminal verdicts, in test case order, into an [`Aggregate`].
///
/// Every non-accepted case overwrites both the status and the error message,
/// so the last failing case decides the outcome: a runtime error followed by
/// a wrong answer reports `Wrong`.
pub fn aggregate(verdicts: &[ExecutionVerdict]) -> Aggregate {
    let mut result = Aggregate {
        status: SubmissionStatus::Accepted,
        passed: 0,
        total: verdicts.len() as u32,
        runtime: 0.0,
        memory: 0,
        error_message: String::new(),
    };

    for verdict in verdicts {
        match verdict.category() {
            StatusCategory::Accepted => {
                result.passed += 1;
                result.runtime += verdict.time.unwrap_or(0.0);
                result.memory = result.memory.max(verdict.memory.unwrap_or(0));
            }
            failed => {
                result.status = if failed == StatusCategory::RuntimeError {
                    SubmissionStatus::Error
                } else {
                    SubmissionStatus::Wrong
                };
                result.error_message = verdict.stderr.clone().unwrap_or_default();
            }
        }
    }

    result
}
