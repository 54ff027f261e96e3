//! Last-owner protection: a tenant's sole `tenant_owner` cannot have that
//! role revoked, since doing so would leave the tenant ownerless.

mod common;

use common::TestApp;

#[tokio::test]
async fn removing_sole_tenant_owner_role_is_refused() {
    let app = TestApp::spawn().await;
    let (tenant, owner) = app.create_tenant_with_owner("soleowner", "frank", "Passw0rd!frank").await;
    let owner_role_id = app.find_role_by_label(tenant.tenant_id, "tenant_owner").await;

    let token = app.mint_access_token(&owner, vec!["tenant_owner".to_string()], vec!["*:*".to_string()]).await;

    let response = app
        .client
        .delete(app.url(&format!("/tenants/users/{}/roles/{}", owner.user_id, owner_role_id)))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.expect("invalid json body");
    assert_eq!(body["error"], "last_owner_protected");

    let roles = app.state.db.get_user_role_labels(owner.user_id).await.expect("failed to read roles");
    assert!(roles.iter().any(|r| r == "tenant_owner"));
}

#[tokio::test]
async fn removing_tenant_owner_role_succeeds_once_a_second_owner_exists() {
    let app = TestApp::spawn().await;
    let (tenant, owner) = app.create_tenant_with_owner("twoowners", "grace", "Passw0rd!grace").await;
    let owner_role_id = app.find_role_by_label(tenant.tenant_id, "tenant_owner").await;
    let second_owner = app.create_tenant_user(tenant.tenant_id, "heidi", "Passw0rd!heidi").await;
    app.state.db.assign_role_to_user(second_owner.user_id, owner_role_id).await.expect("failed to assign second owner role");

    let token = app.mint_access_token(&owner, vec!["tenant_owner".to_string()], vec!["*:*".to_string()]).await;

    let response = app
        .client
        .delete(app.url(&format!("/tenants/users/{}/roles/{}", owner.user_id, owner_role_id)))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    let roles = app.state.db.get_user_role_labels(owner.user_id).await.expect("failed to read roles");
    assert!(!roles.iter().any(|r| r == "tenant_owner"));
}
