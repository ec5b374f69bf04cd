mod common;

use std::sync::Arc;

use actix_web::{App, test, web};
use assert_json_diff::assert_json_include;
use pretty_assertions::assert_eq;
use serde_json::json;

use codearena::auth::Role;
use codearena::database as db;
use codearena::problem::{ProblemDetail, ProblemSummary, Tag};
use codearena::routes::IssuedCredential;
use codearena::web_server::configure;

use common::*;

#[actix_web::test]
async fn test_problem_lifecycle() {
    let (db_pool, _guard) = create_test_db().await;
    let judge = Arc::new(FakeJudge::accepting());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(judge.clone()))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    // Create
    let req = test::TestRequest::post()
        .uri("/problems")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(sample_draft())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Problem created successfully");
    let problem_id = body["problem_id"].as_i64().unwrap();

    // reference solution checked on the visible cases
    assert_eq!(judge.batch_sizes(), vec![2]);
    let requests = judge.submitted_requests();
    assert_eq!(requests[0].stdin, "1 2");
    assert_eq!(requests[0].expected_output, "3");
    assert_eq!(requests[0].language_id, 71);

    // Detail hides the hidden cases
    let req = test::TestRequest::get()
        .uri(&format!("/problems/{problem_id}"))
        .to_request();
    let detail: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_json_include!(
        actual: detail.clone(),
        expected: json!({
            "id": problem_id,
            "title": "Sum of Two",
            "difficulty": "easy",
            "tags": ["math"],
            "visible_test_cases": [
                { "input": "1 2", "output": "3", "explanation": "1 + 2 = 3" },
                { "input": "10 5", "output": "15", "explanation": "10 + 5 = 15" }
            ],
            "start_code": [{ "language": "python" }]
        })
    );
    assert!(detail.get("hidden_test_cases").is_none());
    assert!(detail.get("creator_id").is_none());

    // List
    let req = test::TestRequest::get().uri("/problems").to_request();
    let list: Vec<ProblemSummary> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, problem_id);
    assert_eq!(list[0].tags, vec![Tag::Math]);

    // Update
    let mut draft = sample_draft();
    draft.title = "Sum of Two Integers".to_string();
    draft.tags = vec![Tag::Math, Tag::Greedy];
    draft.hidden_test_cases.pop();
    let req = test::TestRequest::put()
        .uri(&format!("/problems/{problem_id}"))
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(&draft)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/problems/{problem_id}"))
        .to_request();
    let detail: ProblemDetail = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail.title, "Sum of Two Integers");
    assert_eq!(detail.tags, vec![Tag::Math, Tag::Greedy]);
    let stored = db::fetch_problem(&db_pool, problem_id).await.unwrap();
    assert_eq!(stored.draft.hidden_test_cases.len(), 1);

    // Delete
    let req = test::TestRequest::delete()
        .uri(&format!("/problems/{problem_id}"))
        .insert_header(bearer(ADMIN_TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/problems/{problem_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_NOT_FOUND");
    assert_eq!(body["code"], 3);

    let req = test::TestRequest::delete()
        .uri(&format!("/problems/{problem_id}"))
        .insert_header(bearer(ADMIN_TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_problem_authoring_is_admin_only() {
    let (db_pool, _guard) = create_test_db().await;
    let (_, token) = create_test_user(&db_pool, "mallory").await;
    let judge = Arc::new(FakeJudge::accepting());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(judge.clone()))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/problems")
        .set_json(sample_draft())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/problems")
        .insert_header(bearer(&token))
        .set_json(sample_draft())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_FORBIDDEN");

    let req = test::TestRequest::delete()
        .uri("/problems/1")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    assert!(judge.batch_sizes().is_empty());
    assert!(db::list_problems(&db_pool).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_failing_reference_solution_rejects_problem() {
    let (db_pool, _guard) = create_test_db().await;
    let judge = Arc::new(FakeJudge::new(1, |r| {
        if r.stdin == "10 5" {
            failed(6, None)
        } else {
            accepted(0.01, 100)
        }
    }));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(judge))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/problems")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(sample_draft())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["message"],
        "Reference solution for python failed to pass visible test cases"
    );

    assert!(db::list_problems(&db_pool).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_invalid_problem_drafts() {
    let (db_pool, _guard) = create_test_db().await;
    let judge = Arc::new(FakeJudge::accepting());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(judge.clone()))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    // Unknown tag is rejected by the extractor
    let mut body = serde_json::to_value(sample_draft()).unwrap();
    body["tags"] = json!(["math", "astrology"]);
    let req = test::TestRequest::post()
        .uri("/problems")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "reason": "ERR_INVALID_ARGUMENT", "code": 1 }));

    // No hidden cases
    let mut draft = sample_draft();
    draft.hidden_test_cases.clear();
    let req = test::TestRequest::post()
        .uri("/problems")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(&draft)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "At least one hidden test case is required");

    // Update of a missing problem
    let req = test::TestRequest::put()
        .uri("/problems/42")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(sample_draft())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    // Non-numeric id
    let req = test::TestRequest::get().uri("/problems/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    assert!(judge.batch_sizes().is_empty());
}

#[actix_web::test]
async fn test_user_and_session_management() {
    let (db_pool, _guard) = create_test_db().await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(Arc::new(FakeJudge::accepting())))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/users")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(json!({ "name": "Oscar", "email": "Oscar@Example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let credential: IssuedCredential = test::read_body_json(resp).await;
    assert_eq!(credential.user.email, "oscar@example.com");
    assert_eq!(credential.user.role, Role::User);

    // Same email again
    let req = test::TestRequest::post()
        .uri("/users")
        .insert_header(bearer(ADMIN_TOKEN))
        .set_json(json!({ "name": "Oscar", "email": "oscar@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Regular users cannot create users
    let req = test::TestRequest::post()
        .uri("/users")
        .insert_header(bearer(&credential.token))
        .set_json(json!({ "name": "Peggy", "email": "peggy@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // Bearer header
    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(bearer(&credential.token))
        .to_request();
    let me: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_json_include!(
        actual: me,
        expected: json!({ "id": credential.user.id, "name": "Oscar", "role": "user" })
    );

    // Cookie works as well
    let req = test::TestRequest::get()
        .uri("/users/me")
        .cookie(actix_web::cookie::Cookie::new("token", credential.token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri("/users/me/solved")
        .insert_header(bearer(&credential.token))
        .to_request();
    let solved: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(solved, json!({ "problem_solved": [] }));

    // Logout revokes the token
    let req = test::TestRequest::delete()
        .uri("/sessions/current")
        .insert_header(bearer(&credential.token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);

    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(bearer(&credential.token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let admin = db::find_user(&db_pool, 0).await.unwrap().unwrap();
    assert_eq!(admin.role, Role::Admin);
}

#[actix_web::test]
async fn test_delete_own_account() {
    let (db_pool, _guard) = create_test_db().await;
    let (user_id, token) = create_test_user(&db_pool, "rupert").await;
    let (_, other_token) = create_test_user(&db_pool, "sybil").await;
    let problem_id = db::insert_problem(&db_pool, 0, &sample_draft()).await.unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(Arc::new(FakeJudge::accepting())))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    for token in [&token, &other_token] {
        let req = test::TestRequest::post()
            .uri(&format!("/problems/{problem_id}/submit"))
            .insert_header(bearer(token))
            .set_json(json!({ "code": "print(3)", "language": "python" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    let req = test::TestRequest::delete()
        .uri("/users/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Deleted successfully");

    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    assert!(db::find_user(&db_pool, user_id).await.unwrap().is_none());
    assert!(
        db::fetch_user_submissions(&db_pool, user_id, problem_id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(db::solved_problems(&db_pool, user_id).await.unwrap().is_empty());

    // other users keep their history
    let req = test::TestRequest::get()
        .uri(&format!("/problems/{problem_id}/submissions"))
        .insert_header(bearer(&other_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_account_deletion_refusals() {
    let (db_pool, _guard) = create_test_db().await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(evaluator_with(Arc::new(FakeJudge::accepting())))
            .app_data(no_cooldown())
            .configure(configure),
    )
    .await;

    // the configured administrator stays
    let req = test::TestRequest::delete()
        .uri("/users/me")
        .insert_header(bearer(ADMIN_TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_INVALID_STATE");
    assert!(db::find_user(&db_pool, 0).await.unwrap().is_some());

    // an administrator who authored a problem
    let author = db::create_user(&db_pool, "trent", "trent@example.com", Role::Admin)
        .await
        .unwrap();
    let author_token = db::create_session(&db_pool, author.id).await.unwrap();
    db::insert_problem(&db_pool, author.id, &sample_draft()).await.unwrap();

    let req = test::TestRequest::delete()
        .uri("/users/me")
        .insert_header(bearer(&author_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Users who authored problems cannot be deleted");
    assert!(db::find_user(&db_pool, author.id).await.unwrap().is_some());

    // no credential
    let req = test::TestRequest::delete().uri("/users/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}
