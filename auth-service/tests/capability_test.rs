//! Capability gate: all three layers (tenant entitlement, tenant
//! enablement, user opt-in) must be explicitly granted before a
//! capability-gated route succeeds.

mod common;

use common::TestApp;

#[tokio::test]
async fn mfa_enrollment_requires_all_three_capability_layers() {
    let app = TestApp::spawn().await;
    app.seed_system_capability("mfa", true).await;
    let (tenant, owner) = app.create_tenant_with_owner("capco", "erin", "Passw0rd!erin").await;
    let token = app.mint_access_token(&owner, vec!["tenant_owner".to_string()], vec!["*:*".to_string()]).await;

    // Entitled but not yet enabled tenant-wide: the gate stays closed.
    let put_entitled = app
        .client
        .put(app.url(&format!("/tenants/{}/capabilities/mfa", tenant.tenant_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "entitled": true, "enabled": false }))
        .send()
        .await
        .expect("set tenant capability request failed");
    assert_eq!(put_entitled.status(), 200);

    let blocked = app
        .client
        .post(app.url("/auth/mfa/enroll"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("enroll request failed");
    assert_eq!(blocked.status(), 403);
    let blocked_body: serde_json::Value = blocked.json().await.expect("invalid json body");
    assert_eq!(blocked_body["error"], "feature_not_enabled");

    // Enable tenant-wide...
    let enable_tenant = app
        .client
        .put(app.url(&format!("/tenants/{}/capabilities/mfa", tenant.tenant_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "entitled": true, "enabled": true }))
        .send()
        .await
        .expect("enable tenant capability request failed");
    assert_eq!(enable_tenant.status(), 200);

    // ...but the user layer still hasn't opted in, so the gate is still shut.
    let still_blocked = app
        .client
        .post(app.url("/auth/mfa/enroll"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("enroll request failed");
    assert_eq!(still_blocked.status(), 403);

    let enable_user = app
        .client
        .put(app.url(&format!("/tenants/{}/capabilities/mfa/user", tenant.tenant_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "enabled": true }))
        .send()
        .await
        .expect("enable user capability request failed");
    assert_eq!(enable_user.status(), 200);

    let allowed = app
        .client
        .post(app.url("/auth/mfa/enroll"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("enroll request failed");
    assert_eq!(allowed.status(), 200);
    let enrollment: serde_json::Value = allowed.json().await.expect("invalid json body");
    assert!(enrollment["otpauth_uri"].as_str().expect("missing otpauth_uri").starts_with("otpauth://totp/"));
}
