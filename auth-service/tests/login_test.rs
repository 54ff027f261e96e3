//! Login without MFA: a tenant-scoped credential login mints a token pair
//! and records a success audit event.

mod common;

use common::TestApp;

#[tokio::test]
async fn login_without_mfa_issues_tokens() {
    let app = TestApp::spawn().await;
    let (tenant, alice) = app.create_tenant_with_owner("acme", "alice", "P@ssw0rd!23").await;

    let response = app
        .client
        .post(app.url("/auth/login"))
        .header("X-Tenant-ID", &tenant.tenant_slug)
        .json(&serde_json::json!({ "username": "alice", "password": "P@ssw0rd!23", "remember_me": false }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("invalid json body");
    let access_token = body["access_token"].as_str().expect("missing access_token");
    assert!(!body["refresh_token"].as_str().expect("missing refresh_token").is_empty());
    assert_eq!(body["expires_in"], 900);

    let claims = app.state.jwt.validate_access_token(access_token).expect("access token should validate");
    assert!(!claims.amr.iter().any(|f| f == "totp"));
    assert_eq!(claims.sub, alice.user_id.to_string());
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = TestApp::spawn().await;
    let (tenant, _owner) = app.create_tenant_with_owner("wrongpass", "carol", "P@ssw0rd!23").await;

    let response = app
        .client
        .post(app.url("/auth/login"))
        .header("X-Tenant-ID", &tenant.tenant_slug)
        .json(&serde_json::json!({ "username": "carol", "password": "not-the-password", "remember_me": false }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.expect("invalid json body");
    assert_eq!(body["error"], "authentication_failed");
}

#[tokio::test]
async fn login_without_tenant_header_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/auth/login"))
        .json(&serde_json::json!({ "username": "nobody", "password": "irrelevant", "remember_me": false }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.expect("invalid json body");
    assert_eq!(body["error"], "tenant_required");
}
