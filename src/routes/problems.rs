use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::{ApiError, not_found_or};
use crate::auth::{AdminUser, AuthenticatedUser};
use crate::database as db;
use crate::judge::Evaluator;
use crate::problem::ProblemDraft;

#[derive(Serialize, Debug)]
pub struct ProblemAck {
    pub message: &'static str,
    pub problem_id: i64,
}

#[derive(Serialize, Debug)]
pub struct SolvedProblems {
    pub problem_solved: Vec<crate::problem::ProblemSummary>,
}

/// Every reference solution has to pass every visible case before a
/// problem is stored.
async fn check_reference_solutions(
    evaluator: &Evaluator,
    draft: &ProblemDraft,
) -> Result<(), ApiError> {
    for reference in &draft.reference_solution {
        let passed = evaluator
            .passes_all(
                reference.language,
                &reference.solution,
                &draft.visible_test_cases,
            )
            .await?;

        if !passed {
            log::info!(
                "Reference solution for {} failed visible test cases",
                reference.language
            );
            return Err(ApiError::InvalidArgument(format!(
                "Reference solution for {} failed to pass visible test cases",
                reference.language
            )));
        }
    }
    Ok(())
}

fn validated(draft: ProblemDraft) -> Result<ProblemDraft, ApiError> {
    draft.validate().map_err(ApiError::InvalidArgument)?;
    Ok(draft.normalized())
}

#[post("/problems")]
pub async fn create_problem_handler(
    admin: AdminUser,
    pool: web::Data<SqlitePool>,
    evaluator: web::Data<Evaluator>,
    body: web::Json<ProblemDraft>,
) -> Result<HttpResponse, ApiError> {
    let draft = validated(body.into_inner())?;
    check_reference_solutions(&evaluator, &draft).await?;

    let problem_id = db::insert_problem(pool.get_ref(), admin.0.user.id, &draft).await?;
    log::info!("Admin {} created problem {problem_id}", admin.0.user.id);

    Ok(HttpResponse::Created().json(ProblemAck {
        message: "Problem created successfully",
        problem_id,
    }))
}

#[put("/problems/{id}")]
pub async fn update_problem_handler(
    admin: AdminUser,
    pool: web::Data<SqlitePool>,
    evaluator: web::Data<Evaluator>,
    path: web::Path<(i64,)>,
    body: web::Json<ProblemDraft>,
) -> Result<HttpResponse, ApiError> {
    let problem_id = path.into_inner().0;
    let draft = validated(body.into_inner())?;

    // Fail fast before spending executions on a missing problem
    db::fetch_problem(pool.get_ref(), problem_id)
        .await
        .map_err(|e| not_found_or(e, || format!("Problem {problem_id}")))?;

    check_reference_solutions(&evaluator, &draft).await?;

    if !db::replace_problem(pool.get_ref(), problem_id, admin.0.user.id, &draft).await? {
        return Err(ApiError::NotFound(format!("Problem {problem_id} not found.")));
    }
    log::info!("Admin {} updated problem {problem_id}", admin.0.user.id);

    Ok(HttpResponse::Ok().json(ProblemAck {
        message: "Problem updated successfully",
        problem_id,
    }))
}

#[delete("/problems/{id}")]
pub async fn delete_problem_handler(
    admin: AdminUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> Result<HttpResponse, ApiError> {
    let problem_id = path.into_inner().0;

    if !db::delete_problem(pool.get_ref(), problem_id).await? {
        return Err(ApiError::NotFound(format!("Problem {problem_id} not found.")));
    }
    log::info!("Admin {} deleted problem {problem_id}", admin.0.user.id);

    Ok(HttpResponse::Ok().json(ProblemAck {
        message: "Problem deleted successfully",
        problem_id,
    }))
}

#[get("/problems")]
pub async fn list_problems_handler(
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let problems = db::list_problems(pool.get_ref()).await?;
    log::info!("Got {} problems", problems.len());
    Ok(HttpResponse::Ok().json(problems))
}

#[get("/problems/{id}")]
pub async fn get_problem_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(i64,)>,
) -> Result<HttpResponse, ApiError> {
    let problem_id = path.into_inner().0;
    let problem = db::fetch_problem(pool.get_ref(), problem_id)
        .await
        .map_err(|e| not_found_or(e, || format!("Problem {problem_id}")))?;
    Ok(HttpResponse::Ok().json(problem.detail()))
}

#[get("/users/me/solved")]
pub async fn solved_problems_handler(
    caller: AuthenticatedUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let problem_solved = db::solved_problems(pool.get_ref(), caller.user.id).await?;
    Ok(HttpResponse::Ok().json(SolvedProblems { problem_solved }))
}
