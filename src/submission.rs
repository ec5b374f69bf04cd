use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::database as db;
use crate::judge::{EvalError, Evaluator};
use crate::language::Language;
use crate::problem::Problem;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Wrong,
    Error,
}

/// Durable record of one submit, written pending and then once more with
/// its verdict.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    pub code: String,
    pub language: Language,
    pub status: SubmissionStatus,
    /// seconds
    pub runtime: f64,
    /// kilobytes
    pub memory: i64,
    pub error_message: String,
    pub test_cases_passed: i64,
    pub test_cases_total: i64,
    pub created_time: String,
    pub updated_time: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Evaluates `code` on the hidden cases of `problem` and records the outcome.
///
/// The submission row exists in `pending` state before anything is sent to
/// the execution service. If evaluation fails it stays pending; there is no
/// rollback. On completion the problem joins the user's solved list, at most
/// once.
pub async fn submit_solution(
    pool: &SqlitePool,
    evaluator: &Evaluator,
    user_id: i64,
    problem: &Problem,
    language: Language,
    code: &str,
) -> Result<Submission, SubmitError> {
    let cases = &problem.draft.hidden_test_cases;
    let submission_id =
        db::create_pending_submission(pool, user_id, problem.id, language, code, cases.len() as u32)
            .await?;
    log::info!(
        "Created pending submission {submission_id} by user {user_id} for problem {}",
        problem.id
    );

    let outcome = match evaluator.evaluate(language, code, cases).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("Submission {submission_id} left pending: {e}");
            return Err(e.into());
        }
    };

    db::finish_submission(pool, submission_id, &outcome).await?;
    if db::mark_problem_solved(pool, user_id, problem.id).await? {
        log::debug!("Problem {} added to solved list of user {user_id}", problem.id);
    }

    log::info!(
        "Submission {submission_id} finished as {:?} ({}/{})",
        outcome.status,
        outcome.passed,
        outcome.total
    );

    Ok(db::fetch_submission(pool, submission_id).await?)
}
