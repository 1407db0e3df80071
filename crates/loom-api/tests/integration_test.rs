// Integration tests against a running loom-api instance.
// Run with: cargo test --test integration_test -- --ignored
//
// These hit a live server rather than an in-process router so they exercise
// the same TCP/JSON boundary a real migrator or operator would cross.

use chrono::Utc;
use loom_core::{Migration, StepDefinition};
use serde_json::json;

const API_BASE_URL: &str = "http://localhost:8080";

fn sample_migration(id: &str) -> Migration {
    Migration {
        id: id.to_string(),
        name: "rename-widget".to_string(),
        description: "Rename Widget to Gadget across the monorepo".to_string(),
        created_at: Utc::now(),
        required_inputs: vec![],
        steps: vec![StepDefinition {
            name: "rewrite".to_string(),
            migrator_app: "widget-renamer".to_string(),
            config: Default::default(),
            step_type: None,
        }],
        migrator_url: "http://localhost:9001".to_string(),
        candidates: vec![],
    }
}

#[tokio::test]
#[ignore]
async fn test_announce_then_fetch_migration() {
    let client = reqwest::Client::new();

    let announce_response = client
        .post(format!("{}/registry/announce", API_BASE_URL))
        .json(&sample_migration("m-announce-fetch"))
        .send()
        .await
        .expect("failed to announce migration");

    assert_eq!(announce_response.status(), 200);
    let announced: Migration = announce_response.json().await.expect("failed to parse migration");
    assert_eq!(announced.id, "m-announce-fetch");

    let list_response = client
        .get(format!("{}/migrations", API_BASE_URL))
        .send()
        .await
        .expect("failed to list migrations");
    assert_eq!(list_response.status(), 200);
    let migrations: Vec<Migration> = list_response.json().await.expect("failed to parse migrations");
    assert!(migrations.iter().any(|m| m.id == "m-announce-fetch"));

    let get_response = client
        .get(format!("{}/migrations/m-announce-fetch", API_BASE_URL))
        .send()
        .await
        .expect("failed to fetch migration");
    assert_eq!(get_response.status(), 200);

    let missing_response = client
        .get(format!("{}/migrations/does-not-exist", API_BASE_URL))
        .send()
        .await
        .expect("failed to fetch missing migration");
    assert_eq!(missing_response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_submit_candidates_then_start_and_inspect_steps() {
    let client = reqwest::Client::new();

    client
        .post(format!("{}/registry/announce", API_BASE_URL))
        .json(&sample_migration("m-candidate-lifecycle"))
        .send()
        .await
        .expect("failed to announce migration");

    let submit_response = client
        .post(format!("{}/migrations/m-candidate-lifecycle/candidates", API_BASE_URL))
        .json(&json!([{ "id": "repo-a", "kind": "repository", "metadata": {} }]))
        .send()
        .await
        .expect("failed to submit candidates");
    assert_eq!(submit_response.status(), 204);

    let start_response = client
        .post(format!(
            "{}/migrations/m-candidate-lifecycle/candidates/repo-a/start",
            API_BASE_URL
        ))
        .json(&json!({}))
        .send()
        .await
        .expect("failed to start candidate");
    assert_eq!(start_response.status(), 202);

    let double_start_response = client
        .post(format!(
            "{}/migrations/m-candidate-lifecycle/candidates/repo-a/start",
            API_BASE_URL
        ))
        .send()
        .await
        .expect("failed to re-start candidate");
    assert_eq!(double_start_response.status(), 409);

    let steps_response = client
        .get(format!(
            "{}/migrations/m-candidate-lifecycle/candidates/repo-a/steps",
            API_BASE_URL
        ))
        .send()
        .await
        .expect("failed to get candidate steps");
    assert_eq!(steps_response.status(), 200);
    let steps: serde_json::Value = steps_response.json().await.expect("failed to parse steps");
    assert_eq!(steps["status"], "running");
}

#[tokio::test]
#[ignore]
async fn test_event_on_unknown_instance_id_is_bad_request() {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/event/not-a-workflow-id", API_BASE_URL))
        .json(&json!({ "step_name": "rewrite", "status": "completed" }))
        .send()
        .await
        .expect("failed to post event");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_openapi_spec_is_served() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api-doc/openapi.json", API_BASE_URL))
        .send()
        .await
        .expect("failed to fetch openapi spec");

    assert_eq!(response.status(), 200);
    let spec: serde_json::Value = response.json().await.expect("failed to parse openapi spec");
    assert_eq!(spec["info"]["title"], "Loom API");
}
