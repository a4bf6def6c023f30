// tests/api.rs
mod common;

use common::TestApp;
use placement_insights::core::llm_client::GenerationError;
use rocket::http::{ContentType, Status};
use serde_json::{json, Value};

async fn post_json(app: &TestApp, user: &str, uri: &str, body: Value) -> (Status, Value) {
    let response = app
        .client
        .post(uri)
        .header(ContentType::JSON)
        .header(app.bearer(user))
        .body(body.to_string())
        .dispatch()
        .await;
    let status = response.status();
    (status, response.into_json().await.unwrap_or(Value::Null))
}

async fn get_json(app: &TestApp, user: &str, uri: &str) -> (Status, Value) {
    let response = app.client.get(uri).header(app.bearer(user)).dispatch().await;
    let status = response.status();
    (status, response.into_json().await.unwrap_or(Value::Null))
}

#[rocket::async_test]
async fn jobs_count_template_returns_single_metric() {
    let app = TestApp::new().await;
    app.user("admin-1", "admin").await;
    app.company("acme", 42, 0).await;
    app.generation.set("insights", json!({"insights": "- 42 jobs are open"}));

    let (status, body) = post_json(&app, "admin-1", "/api/query", json!({"templateId": "jobs-count"})).await;

    assert_eq!(status, Status::Ok);
    assert_eq!(body["rows"], json!([{"count": 42}]));
    assert_eq!(body["visualization"]["chartType"], "metric");
    assert_eq!(body["rowCount"], 1);
    assert_eq!(body["insights"], "- 42 jobs are open");
}

#[rocket::async_test]
async fn company_free_text_sees_only_its_active_jobs() {
    let app = TestApp::new().await;
    app.company("acme", 3, 2).await;
    app.company("globex", 5, 0).await;
    app.generation.set("classify", json!({"answerable": true}));
    app.generation.set(
        "plan",
        json!({
            "plan": {
                "targetEntities": ["jobs"],
                "projections": [{"column": "jobs.title"}, {"column": "jobs.status"}],
                "filters": [{"column": "jobs.status", "operator": "eq", "value": "active"}]
            },
            "explanation": "Active jobs"
        }),
    );

    let (status, body) = post_json(&app, "user-acme", "/api/query", json!({"query": "Show me all active jobs"})).await;

    assert_eq!(status, Status::Ok);
    assert_eq!(body["rowCount"], 3);
    assert!(body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .all(|row| row["status"] == "active"));
}

#[rocket::async_test]
async fn destructive_question_is_refused_without_planning() {
    let app = TestApp::new().await;
    app.user("admin-1", "admin").await;
    app.generation.set(
        "classify",
        json!({"answerable": false, "reason": "Only read-only analytics are supported"}),
    );

    let (status, body) = post_json(&app, "admin-1", "/api/query", json!({"query": "Drop the jobs table"})).await;

    assert_eq!(status, Status::UnprocessableEntity);
    assert_eq!(body["error_code"], "UNANSWERABLE");
    assert_eq!(body["success"], false);
    assert_eq!(app.generation.calls("plan"), 0);

    let (_, history) = get_json(&app, "admin-1", "/api/query").await;
    assert_eq!(history, json!([]));
}

#[rocket::async_test]
async fn generation_quota_is_reported_as_429() {
    let app = TestApp::new().await;
    app.user("admin-1", "admin").await;
    app.generation.fail(
        "classify",
        GenerationError::RateLimited {
            retry_after_secs: Some(30),
        },
    );

    let response = app
        .client
        .post("/api/query")
        .header(ContentType::JSON)
        .header(app.bearer("admin-1"))
        .body(json!({"query": "How many jobs are open?"}).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::TooManyRequests);
    assert_eq!(response.headers().get_one("Retry-After"), Some("30"));
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["error_code"], "RATE_LIMITED");
    assert_eq!(body["retry_after"], 30);
    assert_eq!(app.generation.calls("plan"), 0);
}

#[rocket::async_test]
async fn clearing_history_reports_deleted_count() {
    let app = TestApp::new().await;
    app.user("admin-1", "admin").await;
    app.company("acme", 2, 0).await;

    for _ in 0..5 {
        let (status, _) = post_json(&app, "admin-1", "/api/query", json!({"templateId": "jobs-count"})).await;
        assert_eq!(status, Status::Ok);
    }

    let (_, history) = get_json(&app, "admin-1", "/api/query?limit=10").await;
    assert_eq!(history.as_array().unwrap().len(), 5);
    let (_, again) = get_json(&app, "admin-1", "/api/query?limit=10").await;
    assert_eq!(history, again);

    let response = app
        .client
        .delete("/api/query")
        .header(app.bearer("admin-1"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_json::<Value>().await.unwrap(), json!({"deletedCount": 5}));

    let (_, history) = get_json(&app, "admin-1", "/api/query?limit=10").await;
    assert_eq!(history, json!([]));
}

#[rocket::async_test]
async fn global_history_is_admin_only() {
    let app = TestApp::new().await;
    app.company("acme", 1, 0).await;

    let response = app
        .client
        .delete("/api/query?scope=global")
        .header(app.bearer("user-acme"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["error_code"], "FORBIDDEN");
}

#[rocket::async_test]
async fn requests_without_valid_identity_are_rejected() {
    let app = TestApp::new().await;

    let response = app.client.get("/api/templates").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["error_code"], "UNAUTHORIZED");
    assert_eq!(body["error"], "Authorization token required");

    let (status, body) = get_json(&app, "ghost", "/api/templates").await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["error"], "User not found");
}

#[rocket::async_test]
async fn templates_are_filtered_by_role() {
    let app = TestApp::new().await;
    app.student("s1", "8.2").await;

    let (status, body) = get_json(&app, "user-s1", "/api/templates").await;
    assert_eq!(status, Status::Ok);

    let templates = body["templates"].as_array().unwrap();
    assert!(!templates.is_empty());
    assert!(templates
        .iter()
        .all(|t| t["roles"].as_array().unwrap().contains(&json!("student"))));
    assert!(!body["categories"].as_array().unwrap().is_empty());

    let (status, body) = post_json(&app, "user-s1", "/api/query", json!({"templateId": "jobs-count"})).await;
    assert_eq!(status, Status::Forbidden);
    assert_eq!(body["error_code"], "FORBIDDEN");
}

#[rocket::async_test]
async fn profile_gaps_are_cached_until_refreshed() {
    let app = TestApp::new().await;
    app.student("s1", "7.4").await;
    app.company("acme", 2, 0).await;
    app.generation.set(
        "profile_gaps",
        json!({"gaps": [
            {"category": "projects", "title": "Ship a project", "description": "d", "priority": "high", "actionItems": ["Build a REST API"]},
            {"category": "skills", "title": "Learn SQL", "description": "d", "priority": "medium", "actionItems": []}
        ]}),
    );

    let (status, first) = get_json(&app, "user-s1", "/api/profile-suggestions").await;
    assert_eq!(status, Status::Ok);
    assert_eq!(first["fromCache"], false);
    assert_eq!(first["suggestions"][0]["title"], "Ship a project");

    let (_, second) = get_json(&app, "user-s1", "/api/profile-suggestions").await;
    assert_eq!(second["fromCache"], true);
    assert_eq!(second["lastGenerated"], first["lastGenerated"]);
    assert_eq!(app.generation.calls("profile_gaps"), 1);

    let response = app
        .client
        .post("/api/profile-suggestions")
        .header(app.bearer("user-s1"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let refreshed: Value = response.into_json().await.unwrap();
    assert_eq!(refreshed["refreshed"], true);
    assert_eq!(app.generation.calls("profile_gaps"), 2);
}

#[rocket::async_test]
async fn profile_gaps_are_for_students_only() {
    let app = TestApp::new().await;
    app.company("acme", 1, 0).await;

    let (status, body) = get_json(&app, "user-acme", "/api/profile-suggestions").await;
    assert_eq!(status, Status::Forbidden);
    assert_eq!(body["error_code"], "FORBIDDEN");
    assert_eq!(app.generation.calls("profile_gaps"), 0);
}

#[rocket::async_test]
async fn suggestions_follow_role_heuristics() {
    let app = TestApp::new().await;
    app.company("acme", 0, 0).await;

    let (status, body) = get_json(&app, "user-acme", "/api/suggestions").await;
    assert_eq!(status, Status::Ok);
    assert_eq!(
        body["suggestions"],
        json!([{
            "type": "action",
            "title": "Post your first job",
            "description": "Start attracting talented students by posting your first job opening.",
            "priority": "high"
        }])
    );
}

#[rocket::async_test]
async fn follow_ups_degrade_to_empty_list() {
    let app = TestApp::new().await;
    app.student("s1", "8.0").await;

    let (status, body) = get_json(&app, "user-s1", "/api/query/follow-ups").await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!({"suggestions": []}));
}

#[rocket::async_test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let response = app.client.get("/api/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_json::<Value>().await.unwrap(), json!("OK"));
}
