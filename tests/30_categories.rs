mod common;

use anyhow::Result;
use common::{id_of, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};
use shop_api_rust::database::Collection;

#[tokio::test]
async fn test_create_then_fetch_category() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/categories"))
        .bearer_auth(&server.admin_token)
        .json(&json!({ "name": "Shoes", "icon": "i.png", "color": "#fff" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let created: Value = res.json().await?;
    assert_eq!(created["name"], "Shoes");
    assert_eq!(created["icon"], "i.png");
    assert_eq!(created["color"], "#fff");
    let id = id_of(&created);
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(server.stored(Collection::Categories).await?, 1);

    let res = server.client.get(server.api(&format!("/categories/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await?;
    assert_eq!(fetched, created);
    Ok(())
}

#[tokio::test]
async fn test_update_keeps_untouched_fields() -> Result<()> {
    let server = TestServer::start().await?;
    let id = id_of(&server.create_category("Shoes").await?);

    let res = server
        .client
        .put(server.api(&format!("/categories/{}", id)))
        .bearer_auth(&server.admin_token)
        .json(&json!({ "color": "#000" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let updated: Value = res.json().await?;
    assert_eq!(updated["name"], "Shoes");
    assert_eq!(updated["color"], "#000");
    Ok(())
}

#[tokio::test]
async fn test_delete_and_delete_again() -> Result<()> {
    let server = TestServer::start().await?;
    let id = id_of(&server.create_category("Shoes").await?);
    let url = server.api(&format!("/categories/{}", id));

    let res = server.client.delete(&url).bearer_auth(&server.admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body, json!({ "success": true, "message": "The category is deleted!" }));

    let res = server.client.delete(&url).bearer_auth(&server.admin_token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);

    let res = server.client.get(&url).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_malformed_id_is_client_error() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.api("/categories/not-an-id")).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Invalid Category Id");
    Ok(())
}

#[tokio::test]
async fn test_unknown_fields_are_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.api("/categories"))
        .bearer_auth(&server.admin_token)
        .json(&json!({ "name": "Shoes", "owner": "me" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.stored(Collection::Categories).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_category_count() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_category("Shoes").await?;
    server.create_category("Hats").await?;

    let res = server
        .client
        .get(server.api("/categories/get/count"))
        .bearer_auth(&server.admin_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["categoryCount"], 2);

    let res = server.client.get(server.api("/categories")).send().await?;
    let list: Vec<Value> = res.json().await?;
    assert_eq!(list.len(), 2);
    Ok(())
}
