mod common;

use anyhow::Result;
use common::{id_of, TestServer, ADMIN_EMAIL, ADMIN_PASSWORD};
use reqwest::StatusCode;
use serde_json::{json, Value};
use shop_api_rust::database::Collection;

#[tokio::test]
async fn test_login_token_carries_identity() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/users/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["user"], ADMIN_EMAIL);
    let token = body["token"].as_str().unwrap_or_default();

    let claims = server.keys().verify(token)?;
    assert_eq!(claims.user_id()?, server.admin_id);
    assert!(claims.is_admin);
    assert!(claims.exp > claims.iat);
    Ok(())
}

#[tokio::test]
async fn test_login_for_standard_user() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.register("Jane", "Jane@Shop.test", "secret-pass").await?;
    assert_eq!(user["email"], "jane@shop.test");

    // Email lookup ignores case
    let token = server.login("JANE@shop.test", "secret-pass").await?;
    let claims = server.keys().verify(&token)?;
    assert_eq!(claims.sub, id_of(&user));
    assert!(!claims.is_admin);
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_yields_no_token() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/users/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Password is wrong");
    assert!(body.get("token").is_none());
    Ok(())
}

#[tokio::test]
async fn test_register_never_grants_admin() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/users/register"))
        .json(&json!({ "name": "Mallory", "email": "mallory@shop.test", "password": "pw", "isAdmin": true }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let user: Value = res.json().await?;
    assert_eq!(user["isAdmin"], false);
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_email_conflicts() -> Result<()> {
    let server = TestServer::start().await?;
    server.register("Jane", "jane@shop.test", "pw").await?;

    let res = server
        .client
        .post(server.api("/users/register"))
        .json(&json!({ "name": "Jane Again", "email": "JANE@shop.test", "password": "pw" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "A user with this email already exists");
    assert_eq!(server.stored(Collection::Users).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_authenticated_create_may_grant_admin() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/users"))
        .bearer_auth(&server.admin_token)
        .json(&json!({ "name": "Ops", "email": "ops@shop.test", "password": "pw", "isAdmin": true }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user: Value = res.json().await?;
    assert_eq!(user["isAdmin"], true);

    let token = server.login("ops@shop.test", "pw").await?;
    assert!(server.keys().verify(&token)?.is_admin);
    Ok(())
}

#[tokio::test]
async fn test_update_password_and_profile() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.register("Jane", "jane@shop.test", "old-pass").await?;

    let res = server
        .client
        .put(server.api(&format!("/users/{}", id_of(&user))))
        .bearer_auth(&server.admin_token)
        .json(&json!({ "password": "new-pass", "city": "Lyon" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["city"], "Lyon");
    assert_eq!(updated["name"], "Jane");

    assert!(server.login("jane@shop.test", "old-pass").await.is_err());
    server.login("jane@shop.test", "new-pass").await?;
    Ok(())
}

#[tokio::test]
async fn test_list_show_count_delete() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.register("Jane", "jane@shop.test", "pw").await?;
    let url = server.api(&format!("/users/{}", id_of(&user)));

    let res = server.client.get(server.api("/users")).bearer_auth(&server.admin_token).send().await?;
    let users: Vec<Value> = res.json().await?;
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));

    let res = server.client.get(&url).bearer_auth(&server.admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await?;
    assert_eq!(fetched, user);

    let res = server.client.delete(&url).bearer_auth(&server.admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .get(server.api("/users/get/count"))
        .bearer_auth(&server.admin_token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["userCount"], 1);

    let res = server.client.get(&url).bearer_auth(&server.admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_invalid_registration_payload() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/users/register"))
        .json(&json!({ "name": "Jane", "email": "not-an-email", "password": "pw" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["email"].is_string());
    assert_eq!(server.stored(Collection::Users).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_standard_user_cannot_grant_admin() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.register("Jane", "jane@shop.test", "secret-pass").await?;
    let token = server.login("jane@shop.test", "secret-pass").await?;
    let url = server.api(&format!("/users/{}", id_of(&user)));

    let res = server
        .client
        .put(&url)
        .bearer_auth(&token)
        .json(&json!({ "isAdmin": true }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .post(server.api("/users"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Sidekick", "email": "sidekick@shop.test", "password": "pw", "isAdmin": true }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.stored(Collection::Users).await?, 2);

    // Profile edits that leave the flag alone still go through
    let res = server
        .client
        .put(&url)
        .bearer_auth(&token)
        .json(&json!({ "city": "Lyon", "isAdmin": false }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["isAdmin"], false);
    assert_eq!(updated["city"], "Lyon");

    let token = server.login("jane@shop.test", "secret-pass").await?;
    assert!(!server.keys().verify(&token)?.is_admin);
    Ok(())
}

#[tokio::test]
async fn test_admin_can_promote_user() -> Result<()> {
    let server = TestServer::start().await?;
    let user = server.register("Jane", "jane@shop.test", "secret-pass").await?;

    let res = server
        .client
        .put(server.api(&format!("/users/{}", id_of(&user))))
        .bearer_auth(&server.admin_token)
        .json(&json!({ "isAdmin": true }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["isAdmin"], true);
    Ok(())
}
