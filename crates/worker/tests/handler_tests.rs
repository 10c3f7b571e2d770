//! End-to-end handler scenarios against mock collaborators.
//!
//! The engine, object store, and webhook receiver are all wiremock
//! servers; the engine output directory is a tempdir. Probe and poll
//! intervals run at zero so the scenarios are deterministic and fast.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fluxapp_core::config::{EngineConfig, StorageConfig, WebhookConfig, WorkerConfig};
use fluxapp_core::job::{DeliveryStatus, JobResponse, RunpodJob};
use fluxapp_core::signing::sign_payload;
use fluxapp_worker::JobRunner;

const WEBHOOK_SECRET: &str = "test-webhook-secret";

fn worker_config(engine_uri: &str, output_root: &Path) -> WorkerConfig {
    let host = engine_uri
        .strip_prefix("http://")
        .expect("mock server uri is http")
        .to_string();

    WorkerConfig {
        engine: EngineConfig {
            host,
            probe_interval_ms: 0,
            probe_max_attempts: 3,
            polling_interval_ms: 0,
            polling_max_attempts: 5,
            output_root: output_root.to_path_buf(),
        },
        storage: None,
        webhook: None,
        refresh_worker: false,
    }
}

fn storage_config(storage_uri: &str) -> StorageConfig {
    StorageConfig {
        endpoint_url: storage_uri.to_string(),
        access_key_id: "test-access".into(),
        secret_access_key: "test-secret".into(),
        region: "us-east-1".into(),
        bucket: "test-bucket".into(),
    }
}

async fn mount_ready(engine: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(engine)
        .await;
}

/// Mount a `/prompt` mock that answers `prompt_id` for one specific
/// workflow body, and a `/history` mock that reports it completed with
/// the given artifacts.
async fn mount_workflow(
    engine: &MockServer,
    workflow: serde_json::Value,
    prompt_id: &str,
    filenames: &[&str],
) {
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .and(body_json(json!({ "prompt": workflow })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prompt_id": prompt_id })))
        .mount(engine)
        .await;

    let images: Vec<serde_json::Value> = filenames
        .iter()
        .map(|name| json!({ "subfolder": "", "filename": name, "type": "output" }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/history/{prompt_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            prompt_id: { "outputs": { "9": { "images": images } } }
        })))
        .mount(engine)
        .await;
}

fn job(input: serde_json::Value) -> RunpodJob {
    RunpodJob {
        id: "test-job".into(),
        input,
    }
}

#[tokio::test]
async fn two_workflows_upload_to_storage_and_notify() {
    let engine = MockServer::start().await;
    let storage = MockServer::start().await;
    let webhook = MockServer::start().await;
    let output_dir = tempfile::tempdir().unwrap();

    mount_ready(&engine).await;
    mount_workflow(&engine, json!({"wf": 1}), "p1", &["first.png"]).await;
    mount_workflow(&engine, json!({"wf": 2}), "p2", &["second.png"]).await;
    std::fs::write(output_dir.path().join("first.png"), b"one").unwrap();
    std::fs::write(output_dir.path().join("second.png"), b"two").unwrap();

    Mock::given(method("PUT"))
        .and(path_regex(r"^/test-bucket/test-job/.+\.png$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&storage)
        .await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&webhook)
        .await;

    let mut config = worker_config(&engine.uri(), output_dir.path());
    config.storage = Some(storage_config(&storage.uri()));
    config.webhook = Some(WebhookConfig {
        url: format!("{}/hook", webhook.uri()),
        secret: WEBHOOK_SECRET.into(),
    });

    let runner = JobRunner::new(config);
    let response = runner
        .run(&job(json!({
            "workflow": [{"wf": 1}, {"wf": 2}],
            "inferenceJobId": "inf-1",
        })))
        .await;

    let JobResponse::Completed(result) = &response else {
        panic!("expected a completed job, got {response:?}");
    };
    assert_eq!(result.result.len(), 2);
    for entry in &result.result {
        assert_eq!(entry.status, DeliveryStatus::Success);
        assert!(
            entry.message.contains("/test-bucket/test-job/"),
            "expected a storage URL for the job, got {}",
            entry.message
        );
    }

    // Each webhook delivery is signed over its exact body.
    let requests = webhook.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let body = String::from_utf8(request.body.clone()).unwrap();
        let signature = request.headers.get("X-Webhook-Signature").unwrap();
        assert_eq!(signature.to_str().unwrap(), sign_payload(WEBHOOK_SECRET, &body));

        let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(payload["job_id"], "test-job");
        assert_eq!(payload["inferenceJobId"], "inf-1");
    }
}

#[tokio::test]
async fn poll_timeout_reports_error_but_keeps_delivered_artifacts() {
    let engine = MockServer::start().await;
    let storage = MockServer::start().await;
    let webhook = MockServer::start().await;
    let output_dir = tempfile::tempdir().unwrap();

    mount_ready(&engine).await;
    mount_workflow(&engine, json!({"wf": 1}), "p1", &["done.png"]).await;
    std::fs::write(output_dir.path().join("done.png"), b"done").unwrap();

    // The second workflow queues but never completes.
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .and(body_json(json!({ "prompt": {"wf": 2} })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "prompt_id": "p2" })))
        .mount(&engine)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&engine)
        .await;

    // The completed workflow's artifact is uploaded and notified exactly
    // once even though the job as a whole fails.
    Mock::given(method("PUT"))
        .and(path_regex(r"^/test-bucket/test-job/.+\.png$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&storage)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let mut config = worker_config(&engine.uri(), output_dir.path());
    config.engine.polling_max_attempts = 3;
    config.storage = Some(storage_config(&storage.uri()));
    config.webhook = Some(WebhookConfig {
        url: format!("{}/hook", webhook.uri()),
        secret: WEBHOOK_SECRET.into(),
    });

    let runner = JobRunner::new(config);
    let response = runner
        .run(&job(json!({
            "workflow": [{"wf": 1}, {"wf": 2}],
            "inferenceJobId": "inf-1",
        })))
        .await;

    let JobResponse::Failed { error } = &response else {
        panic!("expected a failed job, got {response:?}");
    };
    assert!(
        error.contains("Max retries reached while waiting for image generation"),
        "unexpected error: {error}"
    );
    assert!(error.contains("(1/2 workflows completed)"));
}

#[tokio::test]
async fn without_storage_artifacts_are_inlined() {
    let engine = MockServer::start().await;
    let output_dir = tempfile::tempdir().unwrap();

    mount_ready(&engine).await;
    mount_workflow(&engine, json!({"wf": 1}), "p1", &["img.png"]).await;
    std::fs::write(output_dir.path().join("img.png"), b"raw image bytes").unwrap();

    let runner = JobRunner::new(worker_config(&engine.uri(), output_dir.path()));
    let response = runner.run(&job(json!({ "workflow": [{"wf": 1}] }))).await;

    let JobResponse::Completed(result) = &response else {
        panic!("expected a completed job, got {response:?}");
    };
    assert_eq!(result.result.len(), 1);
    assert_eq!(result.result[0].status, DeliveryStatus::Success);
    assert_eq!(result.result[0].message, BASE64.encode(b"raw image bytes"));
}

#[tokio::test]
async fn missing_artifact_is_isolated_per_delivery() {
    let engine = MockServer::start().await;
    let output_dir = tempfile::tempdir().unwrap();

    mount_ready(&engine).await;
    mount_workflow(
        &engine,
        json!({"wf": 1}),
        "p1",
        &["a.png", "gone.png", "c.png"],
    )
    .await;
    std::fs::write(output_dir.path().join("a.png"), b"a").unwrap();
    std::fs::write(output_dir.path().join("c.png"), b"c").unwrap();

    let runner = JobRunner::new(worker_config(&engine.uri(), output_dir.path()));
    let response = runner.run(&job(json!({ "workflow": [{"wf": 1}] }))).await;

    let JobResponse::Completed(result) = &response else {
        panic!("expected a completed job, got {response:?}");
    };
    let statuses: Vec<DeliveryStatus> = result.result.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            DeliveryStatus::Success,
            DeliveryStatus::Error,
            DeliveryStatus::Success,
        ]
    );
    assert!(result.result[1].message.contains("does not exist"));
}

#[tokio::test]
async fn invalid_input_fails_before_any_engine_call() {
    let engine = MockServer::start().await;
    let output_dir = tempfile::tempdir().unwrap();

    // Any request at all would trip this expectation.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&engine)
        .await;

    let runner = JobRunner::new(worker_config(&engine.uri(), output_dir.path()));
    let response = runner.run(&job(json!({}))).await;

    let JobResponse::Failed { error } = &response else {
        panic!("expected a failed job, got {response:?}");
    };
    assert_eq!(error, "Missing 'workflow' parameter");
}

#[tokio::test]
async fn unreachable_engine_aborts_before_submission() {
    let output_dir = tempfile::tempdir().unwrap();

    let mut config = worker_config("http://127.0.0.1:1", output_dir.path());
    config.engine.probe_max_attempts = 2;

    let runner = JobRunner::new(config);
    let response = runner.run(&job(json!({ "workflow": [{"wf": 1}] }))).await;

    let JobResponse::Failed { error } = &response else {
        panic!("expected a failed job, got {response:?}");
    };
    assert_eq!(error, "ComfyUI API is unreachable after 2 attempts");
}

#[tokio::test]
async fn staging_failure_aborts_before_submission() {
    let engine = MockServer::start().await;
    let output_dir = tempfile::tempdir().unwrap();

    mount_ready(&engine).await;
    Mock::given(method("POST"))
        .and(path("/upload/image"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&engine)
        .await;

    let runner = JobRunner::new(worker_config(&engine.uri(), output_dir.path()));
    let response = runner
        .run(&job(json!({
            "workflow": [{"wf": 1}],
            "images": [{"name": "input.png", "image": BASE64.encode(b"input")}],
        })))
        .await;

    let JobResponse::Failed { error } = &response else {
        panic!("expected a failed job, got {response:?}");
    };
    assert!(error.starts_with("Some images failed to upload:"));
    assert!(error.contains("input.png"));
}
