//! Liveness and readiness probes, unauthenticated and unscoped.

mod common;

use common::TestApp;

#[tokio::test]
async fn health_and_ready_report_up() {
    let app = TestApp::spawn().await;

    let health = app.client.get(app.url("/health")).send().await.expect("health request failed");
    assert_eq!(health.status(), 200);
    let health_body: serde_json::Value = health.json().await.expect("invalid json body");
    assert_eq!(health_body["status"], "healthy");

    let ready = app.client.get(app.url("/ready")).send().await.expect("ready request failed");
    assert_eq!(ready.status(), 200);
    let ready_body: serde_json::Value = ready.json().await.expect("invalid json body");
    assert_eq!(ready_body["status"], "ready");
}
