// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! HTTP 路由：状态码与响应体映射

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use styleforge::application::use_cases::generation_use_case::GenerationUseCase;
use styleforge::presentation::routes::routes;
use styleforge::queue::job_queue::InMemoryJobQueue;
use uuid::Uuid;

use super::helpers::harness::{reference_source, Harness, REFERENCE_KEY};

fn server(h: &Harness) -> TestServer {
    let use_case = Arc::new(GenerationUseCase::new(
        h.tasks.clone(),
        h.batches.clone(),
        h.ledger.clone(),
        Arc::new(InMemoryJobQueue::new()),
        50,
    ));
    TestServer::new(routes(use_case)).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let h = Harness::new().await;
    let response = server(&h).get("/health").await;

    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_create_and_fetch_task() {
    let h = Harness::new().await;
    let server = server(&h);

    let created = server
        .post("/v1/tasks")
        .json(&json!({
            "product_image_key": "products/kettle.png",
            "style": { "mode": "reference", "reference_image_key": REFERENCE_KEY }
        }))
        .await;
    created.assert_status(StatusCode::ACCEPTED);
    let created: Value = created.json();
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let fetched = server.get(&format!("/v1/tasks/{id}")).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["current_step"], 0);

    let costs = server.get(&format!("/v1/tasks/{id}/costs")).await;
    costs.assert_status_ok();
    assert_eq!(costs.json::<Value>()["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_validation_error_is_bad_request() {
    let h = Harness::new().await;
    let response = server(&h)
        .post("/v1/batches")
        .json(&json!({
            "product_image_keys": [],
            "style": { "mode": "template", "template_id": "tpl" }
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Validation"));
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let h = Harness::new().await;
    let server = server(&h);

    let response = server
        .get(&format!("/v1/batches/{}", Uuid::new_v4()))
        .await;
    response.assert_status_not_found();
    assert!(response.json::<Value>()["error"].is_string());

    server
        .post(&format!("/v1/tasks/{}/retry", Uuid::new_v4()))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_retry_of_pending_task_conflicts() {
    let h = Harness::new().await;
    let task = h.standalone_task(reference_source()).await;

    server(&h)
        .post(&format!("/v1/tasks/{}/retry", task.id))
        .await
        .assert_status(StatusCode::CONFLICT);
}
