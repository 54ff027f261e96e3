//! Cross-tenant attempt: a token scoped to one tenant (by its own claims,
//! set at issuance) must never reach a resource owned by another tenant.
//! `TenantContext` is derived solely from the access token's `tenant_id`
//! claim, so the header a client sends post-login can't widen or redirect
//! scope - the meaningful boundary to test is a T1 token acting on a T2
//! resource addressed by path parameter.

mod common;

use common::TestApp;

#[tokio::test]
async fn tenant_owner_cannot_suspend_user_in_another_tenant() {
    let app = TestApp::spawn().await;
    let (_t1, owner1) = app.create_tenant_with_owner("tenant-one", "owner1", "Passw0rd!one").await;
    let t2 = app.create_tenant("tenant-two").await;
    let t2_user = app.create_tenant_user(t2.tenant_id, "t2user", "Passw0rd!two").await;

    let token = app.mint_access_token(&owner1, vec!["tenant_owner".to_string()], vec!["*:*".to_string()]).await;

    let response = app
        .client
        .post(app.url(&format!("/tenants/users/{}/suspend", t2_user.user_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "reason": "cross-tenant attempt" }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.expect("invalid json body");
    assert_eq!(body["error"], "tenant_mismatch");

    let unchanged = app.state.db.find_user_by_id(t2_user.user_id).await.expect("db read failed").expect("user should still exist");
    assert_eq!(unchanged.user_state_code, "active");
}

#[tokio::test]
async fn tenant_owner_cannot_assign_foreign_role_to_own_user() {
    let app = TestApp::spawn().await;
    let (_t1, owner1) = app.create_tenant_with_owner("tenant-alpha", "owner2", "Passw0rd!two").await;
    let (t2, _owner2) = app.create_tenant_with_owner("tenant-beta", "owner3", "Passw0rd!three").await;
    let foreign_role_id = app.find_role_by_label(t2.tenant_id, "tenant_admin").await;

    let token = app.mint_access_token(&owner1, vec!["tenant_owner".to_string()], vec!["*:*".to_string()]).await;

    let response = app
        .client
        .post(app.url(&format!("/tenants/users/{}/roles", owner1.user_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "role_id": foreign_role_id }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.expect("invalid json body");
    assert_eq!(body["error"], "tenant_mismatch");
}
