//! Federated identity linking: first link becomes primary, duplicate
//! subjects are rejected, and unlinking requires a reason.

mod common;

use common::TestApp;

#[tokio::test]
async fn first_link_is_primary_and_subjects_are_unique() {
    let app = TestApp::spawn().await;
    let (_tenant, owner) = app.create_tenant_with_owner("idp-co", "ivan", "Passw0rd!ivan").await;
    let token = app.mint_access_token(&owner, vec!["tenant_owner".to_string()], vec!["*:*".to_string()]).await;

    let link = app
        .client
        .post(app.url("/auth/identities"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "provider": "google", "external_id": "sub-123" }))
        .send()
        .await
        .expect("link request failed");
    assert_eq!(link.status(), 200);
    let linked: serde_json::Value = link.json().await.expect("invalid json body");
    assert_eq!(linked["is_primary"], true);
    let identity_id = linked["federated_identity_id"].as_str().expect("missing identity id").to_string();

    let duplicate = app
        .client
        .post(app.url("/auth/identities"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "provider": "google", "external_id": "sub-123" }))
        .send()
        .await
        .expect("duplicate link request failed");
    assert_eq!(duplicate.status(), 400);
    let duplicate_body: serde_json::Value = duplicate.json().await.expect("invalid json body");
    assert_eq!(duplicate_body["error"], "invalid_request");

    let unlink_without_reason = app
        .client
        .delete(app.url(&format!("/auth/identities/{identity_id}")))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "reason": "" }))
        .send()
        .await
        .expect("unlink request failed");
    assert_eq!(unlink_without_reason.status(), 409);
    let reason_body: serde_json::Value = unlink_without_reason.json().await.expect("invalid json body");
    assert_eq!(reason_body["error"], "audit_reason_required");

    let unlink = app
        .client
        .delete(app.url(&format!("/auth/identities/{identity_id}")))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "reason": "user requested unlink" }))
        .send()
        .await
        .expect("unlink request failed");
    assert_eq!(unlink.status(), 200);

    let remaining = app.state.db.find_federated_identities_for_user(owner.user_id).await.expect("db read failed");
    assert!(remaining.is_empty());
}
