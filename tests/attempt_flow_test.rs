use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, patch, post, put},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

fn init_test_env() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("PUBLIC_RPS", "1000");
    env::set_var("ADMIN_RPS", "1000");
    let _ = examprep_backend::config::init_config();
}

fn bearer_for(user_id: i64, role: &str) -> String {
    let claims = examprep_backend::middleware::auth::Claims {
        sub: user_id.to_string(),
        exp: 4102444800,
        role: Some(role.to_string()),
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"test_secret_key"),
    )
    .expect("encode token");
    format!("Bearer {}", token)
}

async fn seed_user(pool: &sqlx::PgPool, name: &str) -> i64 {
    sqlx::query_scalar(
        r#"INSERT INTO users (name, email, role) VALUES ($1, $2, 'student') RETURNING id"#,
    )
    .bind(name)
    .bind(format!("{}_{}@example.com", name, uuid::Uuid::new_v4()))
    .fetch_one(pool)
    .await
    .expect("seed user")
}

fn user_router(state: examprep_backend::AppState) -> Router {
    Router::new()
        .route(
            "/api/attempts",
            post(examprep_backend::routes::attempts::start_attempt)
                .get(examprep_backend::routes::attempts::list_attempts),
        )
        .route(
            "/api/attempts/:id",
            get(examprep_backend::routes::attempts::get_attempt),
        )
        .route(
            "/api/attempts/:id/result",
            post(examprep_backend::routes::attempts::record_result),
        )
        .route(
            "/api/attempts/sections/:id",
            patch(examprep_backend::routes::attempts::update_section_progress),
        )
        .route(
            "/api/attempts/sections/:id/restart",
            post(examprep_backend::routes::attempts::restart_section),
        )
        .route(
            "/api/attempts/sections/:id/answer",
            put(examprep_backend::routes::attempts::record_answer),
        )
        .layer(axum::middleware::from_fn(
            examprep_backend::middleware::auth::require_bearer_auth,
        ))
        .with_state(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", auth);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

#[tokio::test]
async fn attempt_lifecycle_end_to_end() {
    if env::var("DATABASE_URL").is_err() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    init_test_env();

    let pool = examprep_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    examprep_backend::database::seed::seed_dimensions(&pool)
        .await
        .expect("seed dimensions");

    let user_id = seed_user(&pool, "alice").await;
    let other_user_id = seed_user(&pool, "bob").await;

    let test_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO tests (title, level, year, month, skill)
           VALUES ('Practice A', 'B2', 2026, 8, 'listening') RETURNING id"#,
    )
    .fetch_one(&pool)
    .await
    .expect("seed test");

    let section1_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO sections (test_id, name, order_index, time_limit_minutes)
           VALUES ($1, 'Section 1', 0, 20) RETURNING id"#,
    )
    .bind(test_id)
    .fetch_one(&pool)
    .await
    .expect("seed section 1");

    let section2_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO sections (test_id, name, order_index, time_limit_minutes)
           VALUES ($1, 'Section 2', 1, 30) RETURNING id"#,
    )
    .bind(test_id)
    .fetch_one(&pool)
    .await
    .expect("seed section 2");

    let part_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO parts (section_id, name, order_index) VALUES ($1, 'Part 1', 0) RETURNING id"#,
    )
    .bind(section1_id)
    .fetch_one(&pool)
    .await
    .expect("seed part");

    let mut question_ids = Vec::new();
    let mut correct_option_ids = Vec::new();
    let mut wrong_option_ids = Vec::new();
    for i in 0..2 {
        let question_id: i64 = sqlx::query_scalar(
            r#"INSERT INTO questions (part_id, question, order_index) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(part_id)
        .bind(format!("Question {}", i + 1))
        .bind(i)
        .fetch_one(&pool)
        .await
        .expect("seed question");

        let correct: i64 = sqlx::query_scalar(
            r#"INSERT INTO options (question_id, option_text, is_correct)
               VALUES ($1, 'right', TRUE) RETURNING id"#,
        )
        .bind(question_id)
        .fetch_one(&pool)
        .await
        .expect("seed correct option");
        let wrong: i64 = sqlx::query_scalar(
            r#"INSERT INTO options (question_id, option_text, is_correct)
               VALUES ($1, 'wrong', FALSE) RETURNING id"#,
        )
        .bind(question_id)
        .fetch_one(&pool)
        .await
        .expect("seed wrong option");

        question_ids.push(question_id);
        correct_option_ids.push(correct);
        wrong_option_ids.push(wrong);
    }

    let app = user_router(examprep_backend::AppState::new(pool.clone()));
    let auth = bearer_for(user_id, "student");

    // Start: one section attempt per section, seeded time budgets.
    let (status, body) = send(
        &app,
        "POST",
        "/api/attempts",
        &auth,
        Some(json!({ "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["attempt"]["is_completed"], json!(false));
    let sections = body["sections"].as_array().expect("sections array");
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["time_remaining_seconds"], json!(1200));
    assert_eq!(sections[1]["time_remaining_seconds"], json!(1800));
    assert_eq!(sections[0]["status"], json!("not_started"));
    assert_eq!(sections[0]["attempt_number"], json!(1));

    let attempt_id = body["attempt"]["id"].as_i64().unwrap();
    let sa1 = sections[0]["id"].as_i64().unwrap();
    let sa2 = sections[1]["id"].as_i64().unwrap();

    // Ownership: a different user cannot see the attempt at all.
    let other_auth = bearer_for(other_user_id, "student");
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        &other_auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Answers may only land on a started section after legal transitions;
    // jumping not_started -> completed is rejected.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa1),
        &auth,
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa1),
        &auth,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Re-answering the same question replaces the row instead of adding one.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/attempts/sections/{}/answer", sa1),
        &auth,
        Some(json!({
            "question_id": question_ids[0],
            "selected_option_id": wrong_option_ids[0]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/attempts/sections/{}/answer", sa1),
        &auth,
        Some(json!({
            "question_id": question_ids[0],
            "selected_option_id": correct_option_ids[0],
            "marked_for_review": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (answer_rows, is_correct, selected): (i64, bool, i64) = {
        let row: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM user_answers WHERE section_attempt_id = $1 AND question_id = $2"#,
        )
        .bind(sa1)
        .bind(question_ids[0])
        .fetch_one(&pool)
        .await
        .unwrap();
        let detail: (bool, i64) = sqlx::query_as(
            r#"SELECT is_correct, selected_option_id FROM user_answers
               WHERE section_attempt_id = $1 AND question_id = $2"#,
        )
        .bind(sa1)
        .bind(question_ids[0])
        .fetch_one(&pool)
        .await
        .unwrap();
        (row.0, detail.0, detail.1)
    };
    assert_eq!(answer_rows, 1);
    assert!(is_correct);
    assert_eq!(selected, correct_option_ids[0]);

    // Second question answered wrong: section score will be 1 of 2.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/attempts/sections/{}/answer", sa1),
        &auth,
        Some(json!({
            "question_id": question_ids[1],
            "selected_option_id": wrong_option_ids[1]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Pause preserves the remaining budget until resumed.
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa1),
        &auth,
        Some(json!({ "status": "paused", "time_remaining_seconds": 900 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["time_remaining_seconds"], json!(900));

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa1),
        &auth,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["time_remaining_seconds"], json!(900));

    // Complete section 1; the attempt as a whole is still open.
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa1),
        &auth,
        Some(json!({ "status": "completed", "time_remaining_seconds": 400 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct_answers"], json!(1));

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        &auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempt"]["is_completed"], json!(false));

    // A terminal section refuses further mutation and further answers.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa1),
        &auth,
        Some(json!({ "time_remaining_seconds": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/attempts/sections/{}/answer", sa1),
        &auth,
        Some(json!({
            "question_id": question_ids[0],
            "selected_option_id": wrong_option_ids[0]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Finish section 2; completion becomes visible on the next read with
    // no explicit "complete test" call anywhere.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa2),
        &auth,
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/attempts/sections/{}", sa2),
        &auth,
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        &auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempt"]["is_completed"], json!(true));
    assert!(body["attempt"]["completed_at"].is_string());

    // Reading again must not toggle the flag back.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        &auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempt"]["is_completed"], json!(true));

    // Completed attempts cannot reopen sections via retake.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/attempts/sections/{}/restart", sa1),
        &auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The scoring collaborator records the summary verdict.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/attempts/{}/result", attempt_id),
        &auth,
        Some(json!({ "passed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["passed"], json!(true));

    // Funnel over the default window: this test is brand new, so its row
    // reflects exactly this one attempt.
    let reporting = examprep_backend::services::reporting_service::ReportingService::new(
        pool.clone(),
        examprep_backend::services::heatmap_service::HeatmapService::new(
            pool.clone(),
            examprep_backend::config::get_config().heatmap_timezone,
        ),
        examprep_backend::config::get_config().heatmap_timezone,
    );
    let rows = reporting
        .test_funnel(&examprep_backend::dto::reporting_dto::FunnelQuery::default())
        .await
        .expect("funnel");
    let row = rows
        .iter()
        .find(|r| r.test_id == test_id)
        .expect("funnel row for fresh test");
    assert_eq!(row.started, 1);
    assert_eq!(row.completed, 1);
    assert_eq!(row.passed, 1);
    assert_eq!(row.attempt_count, row.completed);
    assert_eq!(row.completion_rate, 100.0);
    assert_eq!(row.pass_rate, 100.0);
}

#[tokio::test]
async fn retake_opens_a_numbered_section_attempt() {
    if env::var("DATABASE_URL").is_err() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    init_test_env();

    let pool = examprep_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");

    let user_id = seed_user(&pool, "carol").await;
    let test_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO tests (title, level) VALUES ('Retake Drill', 'B1') RETURNING id"#,
    )
    .fetch_one(&pool)
    .await
    .expect("seed test");
    sqlx::query(
        r#"INSERT INTO sections (test_id, name, order_index, time_limit_minutes)
           VALUES ($1, 'Only Section', 0, 10)"#,
    )
    .bind(test_id)
    .execute(&pool)
    .await
    .expect("seed section");

    let app = user_router(examprep_backend::AppState::new(pool.clone()));
    let auth = bearer_for(user_id, "student");

    let (status, body) = send(
        &app,
        "POST",
        "/api/attempts",
        &auth,
        Some(json!({ "test_id": test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let sa = body["sections"][0]["id"].as_i64().unwrap();

    // Restarting a live section is rejected.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/attempts/sections/{}/restart", sa),
        &auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for target in ["in_progress", "abandoned"] {
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/attempts/sections/{}", sa),
            &auth,
            Some(json!({ "status": target })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/attempts/sections/{}/restart", sa),
        &auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["attempt_number"], json!(2));
    assert_eq!(body["status"], json!("not_started"));
    assert_eq!(body["time_remaining_seconds"], json!(600));
}

#[tokio::test]
async fn zero_section_tests_are_rejected_at_start() {
    if env::var("DATABASE_URL").is_err() {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    }
    init_test_env();

    let pool = examprep_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");

    let user_id = seed_user(&pool, "dave").await;
    let empty_test_id: i64 = sqlx::query_scalar(
        r#"INSERT INTO tests (title) VALUES ('Empty Shell') RETURNING id"#,
    )
    .fetch_one(&pool)
    .await
    .expect("seed test");

    let app = user_router(examprep_backend::AppState::new(pool.clone()));
    let auth = bearer_for(user_id, "student");

    let (status, _) = send(
        &app,
        "POST",
        "/api/attempts",
        &auth,
        Some(json!({ "test_id": empty_test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // No partial rows were left behind.
    let attempts: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM test_attempts WHERE test_id = $1"#,
    )
    .bind(empty_test_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempts, 0);

    // Unknown test and unknown user are plain NotFound.
    let (status, _) = send(
        &app,
        "POST",
        "/api/attempts",
        &auth,
        Some(json!({ "test_id": 99999999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let ghost_auth = bearer_for(99999999, "student");
    let (status, _) = send(
        &app,
        "POST",
        "/api/attempts",
        &ghost_auth,
        Some(json!({ "test_id": empty_test_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
