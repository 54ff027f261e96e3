//! Refresh rotation and reuse detection: a presented refresh token is only
//! ever valid once; presenting it again revokes the whole chain.

mod common;

use common::TestApp;

#[tokio::test]
async fn refresh_rotates_and_detects_reuse() {
    let app = TestApp::spawn().await;
    let (tenant, dave) = app.create_tenant_with_owner("initech", "dave", "Sup3rSecret!1").await;

    let login = app
        .client
        .post(app.url("/auth/login"))
        .header("X-Tenant-ID", &tenant.tenant_slug)
        .json(&serde_json::json!({ "username": "dave", "password": "Sup3rSecret!1", "remember_me": false }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(login.status(), 200);
    let tokens: serde_json::Value = login.json().await.expect("invalid json body");
    let r1 = tokens["refresh_token"].as_str().expect("missing refresh_token").to_string();

    let rotated = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": r1 }))
        .send()
        .await
        .expect("refresh request failed");
    assert_eq!(rotated.status(), 200);
    let rotated_tokens: serde_json::Value = rotated.json().await.expect("invalid json body");
    let r2 = rotated_tokens["refresh_token"].as_str().expect("missing refresh_token").to_string();
    assert_ne!(r1, r2);

    // Replaying the already-rotated R1 is a reuse signal.
    let reuse = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": r1 }))
        .send()
        .await
        .expect("reuse request failed");
    assert_eq!(reuse.status(), 401);
    let reuse_body: serde_json::Value = reuse.json().await.expect("invalid json body");
    assert_eq!(reuse_body["error"], "unauthorized");

    // The reuse revokes the entire chain, so R2 (minted just before the
    // reuse was detected) is also dead now.
    let after_revocation = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": r2 }))
        .send()
        .await
        .expect("post-revocation request failed");
    assert_eq!(after_revocation.status(), 401);

    let critical_event_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM audit_events WHERE actor_user_id = $1 AND event_type_code = 'token_reused'",
    )
    .bind(dave.user_id)
    .fetch_one(&app.raw_pool())
    .await
    .expect("failed to query audit events");
    assert_eq!(critical_event_exists, 1);
}
