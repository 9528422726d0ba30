//! End-to-end tests for the deployments REST surface, driven through the
//! router without a listening socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use canopy_daemon::{create_router, AppState};
use canopy_engine::{ProvisioningEngine, SimulatedEngine};
use canopy_lifecycle::LifecycleOrchestrator;
use canopy_types::{DeploymentName, ProjectNamespace, ProviderConfig};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower::ServiceExt;

struct TestHarness {
    router: Router,
    engine: Arc<SimulatedEngine>,
    shutdown_rx: watch::Receiver<bool>,
}

fn harness() -> TestHarness {
    let engine = Arc::new(SimulatedEngine::new());
    let dyn_engine: Arc<dyn ProvisioningEngine> = engine.clone();
    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        dyn_engine,
        ProjectNamespace::new("testing").unwrap(),
        ProviderConfig::default(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(orchestrator, shutdown_tx);
    TestHarness {
        router: create_router(state),
        engine,
        shutdown_rx,
    }
}

fn name(value: &str) -> DeploymentName {
    DeploymentName::new(value).unwrap()
}

fn json_request(method: Method, uri: &str, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    builder.body(body).expect("request should build")
}

async fn api_request(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<&Value>,
) -> Result<(StatusCode, Value), String> {
    let response = router
        .clone()
        .oneshot(json_request(method, uri, body))
        .await
        .map_err(|err| format!("send request: {err}"))?;

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .map_err(|err| format!("read body: {err}"))?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).map_err(|err| format!("parse body: {err}"))?
    };
    Ok((status, value))
}

#[tokio::test]
async fn test_site_lifecycle_walkthrough() -> Result<(), String> {
    let harness = harness();
    let router = &harness.router;

    // Publish.
    let (status, body) = api_request(
        router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "site-a", "content": "<h1>A</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "site-a");
    let url = body["url"].as_str().expect("created site has a url");
    assert!(url.starts_with("http://"));

    // Inspect.
    let (status, body) = api_request(router, Method::GET, "/deployments/site-a", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["url"], url);
    assert!(body.get("last_error").is_none());

    // Republish new content.
    let (status, body) = api_request(
        router,
        Method::PUT,
        "/deployments/site-a",
        Some(&json!({ "content": "<h1>B</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().is_some());

    // Tear down.
    let (status, body) = api_request(router, Method::DELETE, "/deployments/site-a", None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    // Gone.
    let (status, body) = api_request(router, Method::GET, "/deployments/site-a", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    // The name is reusable.
    let (status, _) = api_request(
        router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "site-a", "content": "<h1>A again</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    Ok(())
}

#[tokio::test]
async fn test_create_duplicate_conflict() -> Result<(), String> {
    let harness = harness();
    let payload = json!({ "id": "site-a", "content": "<h1>A</h1>" });

    let (status, _) =
        api_request(&harness.router, Method::POST, "/deployments", Some(&payload)).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        api_request(&harness.router, Method::POST, "/deployments", Some(&payload)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");
    assert!(body["error"].as_str().unwrap_or_default().contains("site-a"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_deployment_not_found() -> Result<(), String> {
    let harness = harness();

    let (status, body) =
        api_request(&harness.router, Method::GET, "/deployments/ghost", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = api_request(
        &harness.router,
        Method::PUT,
        "/deployments/ghost",
        Some(&json!({ "content": "<h1>x</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) =
        api_request(&harness.router, Method::DELETE, "/deployments/ghost", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_malformed_identity_rejected() -> Result<(), String> {
    let harness = harness();

    let (status, body) = api_request(
        &harness.router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "Bad Name!", "content": "<h1>x</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, body) =
        api_request(&harness.router, Method::GET, "/deployments/UPPER", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_update_conflict() -> Result<(), String> {
    let harness = harness();
    let (status, _) = api_request(
        &harness.router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "site-a", "content": "<h1>A</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    // First update holds inside the engine.
    let gate = harness.engine.hold_next_apply(&name("site-a"));
    let held = json_request(
        Method::PUT,
        "/deployments/site-a",
        Some(&json!({ "content": "<h1>B</h1>" })),
    );
    let task = tokio::spawn(harness.router.clone().oneshot(held));
    gate.entered().await;

    // Second update is rejected immediately, without queuing.
    let (status, body) = api_request(
        &harness.router,
        Method::PUT,
        "/deployments/site-a",
        Some(&json!({ "content": "<h1>C</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OPERATION_IN_FLIGHT");

    gate.release();
    let response = task
        .await
        .map_err(|err| format!("join update: {err}"))?
        .map_err(|err| format!("held update: {err}"))?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_failed_update_reports_engine_failure() -> Result<(), String> {
    let harness = harness();
    let (status, created) = api_request(
        &harness.router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "site-a", "content": "<h1>A</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    harness
        .engine
        .inject_apply_failure(&name("site-a"), "quota exhausted");
    let (status, body) = api_request(
        &harness.router,
        Method::PUT,
        "/deployments/site-a",
        Some(&json!({ "content": "<h1>B</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "ENGINE_FAILURE");
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("quota exhausted"));

    // The deployment survived with its old content and a failure record.
    let (status, body) =
        api_request(&harness.router, Method::GET, "/deployments/site-a", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["url"], created["url"]);
    assert_eq!(body["last_error"]["operation"], "update");

    Ok(())
}

#[tokio::test]
async fn test_update_provider_override_changes_url_region() -> Result<(), String> {
    let harness = harness();
    let (status, created) = api_request(
        &harness.router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "site-a", "content": "<h1>A</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["url"]
        .as_str()
        .unwrap_or_default()
        .contains("us-east-1"));

    let (status, body) = api_request(
        &harness.router,
        Method::PUT,
        "/deployments/site-a",
        Some(&json!({
            "content": "<h1>B</h1>",
            "provider": "gcp",
            "region": "europe-west1"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().expect("updated site has a url");
    assert!(url.contains("europe-west1"), "stale region in {url}");
    assert!(!url.contains("us-east-1"), "stale region in {url}");

    // The inspected view reports the same endpoint.
    let (status, body) =
        api_request(&harness.router, Method::GET, "/deployments/site-a", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], url);

    Ok(())
}

#[tokio::test]
async fn test_list_reflects_creations() -> Result<(), String> {
    let harness = harness();
    for site in ["site-a", "site-b"] {
        let (status, _) = api_request(
            &harness.router,
            Method::POST,
            "/deployments",
            Some(&json!({ "id": site, "content": "<h1>x</h1>" })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = api_request(&harness.router, Method::GET, "/deployments", None).await?;
    assert_eq!(status, StatusCode::OK);
    let mut ids: Vec<&str> = body["ids"]
        .as_array()
        .expect("ids should be an array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["site-a", "site-b"]);

    Ok(())
}

#[tokio::test]
async fn test_health_status_and_shutdown() -> Result<(), String> {
    let harness = harness();

    let (status, body) = api_request(&harness.router, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = api_request(
        &harness.router,
        Method::POST,
        "/deployments",
        Some(&json!({ "id": "site-a", "content": "<h1>x</h1>" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = api_request(&harness.router, Method::GET, "/status", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["engine"], "simulated");
    assert_eq!(body["project"], "testing");
    assert_eq!(body["deployments"], 1);
    assert_eq!(body["operations_in_flight"], 0);

    let (status, body) =
        api_request(&harness.router, Method::POST, "/system/shutdown", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert!(*harness.shutdown_rx.borrow());

    Ok(())
}
