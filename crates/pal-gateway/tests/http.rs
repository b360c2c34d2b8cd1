mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pal_gateway::*;
use tower::ServiceExt;

async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn setup(root: &std::path::Path) -> (JobGateway, Router) {
    let gateway = JobGateway::new(
        common::registry(&root.join("recording")),
        GatewayConfig {
            workspace_root: root.join("work"),
            max_concurrent_jobs: 1,
            ..GatewayConfig::default()
        },
    )
    .unwrap();
    let app = router(gateway.clone());
    (gateway, app)
}

fn run_body(backend: &str) -> serde_json::Value {
    serde_json::to_value(RunBody {
        request: common::request(),
        backend: backend.to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn submit_poll_and_fetch_result() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, app) = setup(dir.path());

    let (status, body) = send(&app, "POST", "/sim/run", Some(run_body("replay"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    gateway.wait(&job_id, common::POLL).await.unwrap();
    let (status, body) = send(&app, "GET", &format!("/sim/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "done");
    assert_eq!(body["progress"], 100);

    let (status, body) = send(&app, "GET", &format!("/sim/{job_id}/result"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timesteps"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/sim/list?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn lookups_map_to_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, app) = setup(dir.path());

    let (status, body) = send(&app, "GET", "/sim/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
    let (status, _) = send(&app, "GET", "/sim/nope/result", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/sim/run", Some(run_body("simulator/eclipse"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", "/sim/run", Some(run_body("plugin/replay"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "POST", "/sim/run", Some(run_body("simulator/blocker"))).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let (status, body) = send(&app, "GET", &format!("/sim/{job_id}/result"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "POST", &format!("/sim/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    let final_status = gateway.wait(&job_id, common::POLL).await.unwrap();
    assert_eq!(final_status.state, JobState::Failed);
}

#[tokio::test]
async fn stored_results_without_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let (_, app) = setup(dir.path());

    let (status, body) = send(&app, "GET", "/sim/results", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
    let (status, _) = send(&app, "DELETE", "/sim/nope/result", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_lists_backends_and_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let (_, app) = setup(dir.path());

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_concurrent_jobs"], 1);
    let names: Vec<&str> = body["backends"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["replay", "blocker"]);
}
