//! MFA step-up login: wrong code is rejected, the right code completes
//! login, and a redeemed challenge cannot be replayed.

mod common;

use common::{current_totp_code, TestApp};

#[tokio::test]
async fn mfa_challenge_wrong_then_right_code() {
    let app = TestApp::spawn().await;
    let (tenant, bob) = app.create_tenant_with_owner("globex", "bob", "Str0ngPass!9").await;
    let secret = app.enroll_mfa(bob.user_id, "bob").await;

    let login_response = app
        .client
        .post(app.url("/auth/login"))
        .header("X-Tenant-ID", &tenant.tenant_slug)
        .json(&serde_json::json!({ "username": "bob", "password": "Str0ngPass!9", "remember_me": false }))
        .send()
        .await
        .expect("login request failed");

    assert_eq!(login_response.status(), 200);
    let challenge: serde_json::Value = login_response.json().await.expect("invalid json body");
    let mfa_token = challenge["mfa_token"].as_str().expect("missing mfa_token").to_string();
    assert_eq!(challenge["methods"], serde_json::json!(["totp"]));

    let wrong = app
        .client
        .post(app.url("/auth/mfa/verify"))
        .json(&serde_json::json!({ "mfa_token": mfa_token, "code": "000000" }))
        .send()
        .await
        .expect("verify request failed");
    assert_eq!(wrong.status(), 401);
    let wrong_body: serde_json::Value = wrong.json().await.expect("invalid json body");
    assert_eq!(wrong_body["error"], "mfa_invalid");

    let correct_code = current_totp_code(&secret);
    let right = app
        .client
        .post(app.url("/auth/mfa/verify"))
        .json(&serde_json::json!({ "mfa_token": mfa_token, "code": correct_code }))
        .send()
        .await
        .expect("verify request failed");
    assert_eq!(right.status(), 200);
    let tokens: serde_json::Value = right.json().await.expect("invalid json body");
    let access_token = tokens["access_token"].as_str().expect("missing access_token");
    let claims = app.state.jwt.validate_access_token(access_token).expect("access token should validate");
    assert!(claims.amr.iter().any(|f| f == "totp"));

    // The challenge is single-use: GETDEL means replaying it now fails even
    // though the code itself is still time-valid.
    let replay_code = current_totp_code(&secret);
    let replay = app
        .client
        .post(app.url("/auth/mfa/verify"))
        .json(&serde_json::json!({ "mfa_token": mfa_token, "code": replay_code }))
        .send()
        .await
        .expect("replay request failed");
    assert_eq!(replay.status(), 401);
    let replay_body: serde_json::Value = replay.json().await.expect("invalid json body");
    assert_eq!(replay_body["error"], "mfa_invalid");
}
