use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::{ApiError, not_found_or};
use crate::auth::AuthenticatedUser;
use crate::cooldown::Cooldown;
use crate::database as db;
use crate::judge::{Evaluator, ExecutionVerdict};
use crate::language::Language;
use crate::problem::Problem;
use crate::submission::submit_solution;

#[derive(Serialize, Deserialize, Debug)]
pub struct CodeSubmission {
    pub code: String,
    /// Resolved against [`Language`] by the handler
    pub language: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RunResponse {
    pub test_result: Vec<ExecutionVerdict>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmitResponse {
    pub message: String,
    pub submission_id: i64,
}

async fn begin_cooldown(cooldown: &Cooldown, user_id: i64) -> Result<(), ApiError> {
    match cooldown.try_begin(user_id).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            log::info!("User {user_id} hit the run/submit cooldown");
            Err(ApiError::RateLimited(
                "You are submitting too frequently. Please wait before trying again.".into(),
            ))
        }
        Err(e) => {
            log::error!("Cooldown store failed: {e:#}");
            Err(ApiError::Internal("Cooldown store unavailable".into()))
        }
    }
}

/// Shared prelude of run and submit: cooldown, body check, language
/// resolution, problem lookup.
async fn prepare(
    caller: &AuthenticatedUser,
    cooldown: &Cooldown,
    pool: &SqlitePool,
    problem_id: i64,
    body: &CodeSubmission,
) -> Result<(Problem, Language), ApiError> {
    begin_cooldown(cooldown, caller.user.id).await?;

    if body.code.trim().is_empty() || body.language.trim().is_empty() {
        return Err(ApiError::InvalidArgument("Some fields are missing".into()));
    }

    let language = body.language.parse::<Language>().map_err(|e| {
        log::info!("User {} sent {e}", caller.user.id);
        ApiError::InvalidArgument(format!("Unsupported language {}", body.language))
    })?;

    let problem = db::fetch_problem(pool, problem_id)
        .await
        .map_err(|e| not_found_or(e, || format!("Problem {problem_id}")))?;
    Ok((problem, language))
}

/// Runs the code on the problem's visible cases and answers with the raw
/// verdicts. Nothing is persisted.
#[post("/problems/{id}/run")]
pub async fn run_code_handler(
    caller: AuthenticatedUser,
    pool: web::Data<SqlitePool>,
    evaluator: web::Data<Evaluator>,
    cooldown: web::Data<Cooldown>,
    path: web::Path<(i64,)>,
    body: web::Json<CodeSubmission>,
) -> Result<HttpResponse, ApiError> {
    let problem_id = path.into_inner().0;
    let (problem, language) =
        prepare(&caller, &cooldown, pool.get_ref(), problem_id, &body).await?;

    let test_result = evaluator
        .run_cases(language, &body.code, &problem.draft.visible_test_cases)
        .await?;
    log::info!(
        "User {} ran {} visible cases of problem {problem_id}",
        caller.user.id,
        test_result.len()
    );

    Ok(HttpResponse::Ok().json(RunResponse { test_result }))
}

/// Judges the code on the hidden cases. The verdict itself is read back
/// through the submissions listing.
#[post("/problems/{id}/submit")]
pub async fn submit_code_handler(
    caller: AuthenticatedUser,
    pool: web::Data<SqlitePool>,
    evaluator: web::Data<Evaluator>,
    cooldown: web::Data<Cooldown>,
    path: web::Path<(i64,)>,
    body: web::Json<CodeSubmission>,
) -> Result<HttpResponse, ApiError> {
    let problem_id = path.into_inner().0;
    let (problem, language) =
        prepare(&caller, &cooldown, pool.get_ref(), problem_id, &body).await?;

    let submission = submit_solution(
        pool.get_ref(),
        &evaluator,
        caller.user.id,
        &problem,
        language,
        &body.code,
    )
    .await?;

    Ok(HttpResponse::Ok().json(SubmitResponse {
        message: "Code submitted successfully".to_string(),
        submission_id: submission.id,
    }))
}

#[get("/problems/{id}/submissions")]
pub async fn list_submissions_handler(
    caller: AuthenticatedUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> Result<HttpResponse, ApiError> {
    let problem_id = path.into_inner().0;
    let submissions =
        db::fetch_user_submissions(pool.get_ref(), caller.user.id, problem_id).await?;

    if submissions.is_empty() {
        return Err(ApiError::NotFound(
            "No submission found for this problem".into(),
        ));
    }

    log::info!(
        "Got {} submissions of user {} for problem {problem_id}",
        submissions.len(),
        caller.user.id
    );
    Ok(HttpResponse::Ok().json(submissions))
}
