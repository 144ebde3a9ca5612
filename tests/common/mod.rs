#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use uuid::Uuid;

use shop_api_rust::app::{build_router, AppState};
use shop_api_rust::auth::{self, JwtKeys};
use shop_api_rust::config::AppConfig;
use shop_api_rust::database::models::User;
use shop_api_rust::database::{Collection, DocumentStore, MemoryDocumentStore, Repository};
use shop_api_rust::filter::Filter;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@shop.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// A PNG signature is enough; nothing decodes the image
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n0000";

/// One in-process server per test, backed by the in-process store and a
/// temporary upload directory.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: Arc<dyn DocumentStore>,
    pub upload_dir: TempDir,
    pub admin_id: Uuid,
    pub admin_token: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let upload_dir = tempfile::tempdir().context("failed to create upload dir")?;

        let mut config = AppConfig::development();
        config.security.jwt_secret = JWT_SECRET.to_string();
        config.security.bcrypt_cost = 4;
        config.uploads.dir = upload_dir.path().to_path_buf();
        config.api.enable_request_logging = false;
        tweak(&mut config);

        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let state = AppState::new(config, store.clone())?;

        let admin = User {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password_hash: auth::hash_password(ADMIN_PASSWORD.to_string(), 4).await?,
            phone: String::new(),
            is_admin: true,
            street: String::new(),
            apartment: String::new(),
            zip: String::new(),
            city: String::new(),
            country: String::new(),
        };
        Repository::<User>::new(store.clone()).insert(&admin).await?;
        let admin_token = state.keys.issue(admin.id, true)?;

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let router = build_router(state);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            store,
            upload_dir,
            admin_id: admin.id,
            admin_token,
            handle,
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn api(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub fn keys(&self) -> JwtKeys {
        JwtKeys::new(JWT_SECRET, 24).expect("test keys")
    }

    /// Documents in a collection, read behind the API's back
    pub async fn stored(&self, collection: Collection) -> Result<u64> {
        Ok(self.store.count(collection, &Filter::new()).await?)
    }

    pub fn uploaded_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.upload_dir.path().exists() {
            for entry in std::fs::read_dir(self.upload_dir.path())? {
                names.push(entry?.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.api("/users/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: Value = res.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response without token")
    }

    pub async fn create_category(&self, name: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.api("/categories"))
            .bearer_auth(&self.admin_token)
            .json(&json!({ "name": name, "icon": "icon.png", "color": "#fff" }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "create category failed: {}", res.status());
        Ok(res.json().await?)
    }

    pub fn product_form(&self, category: &str, count_in_stock: u32, price: &str) -> Result<multipart::Form> {
        let image = multipart::Part::bytes(PNG_BYTES.to_vec())
            .file_name("red shoe.png")
            .mime_str("image/png")?;
        Ok(multipart::Form::new()
            .text("name", "Runner")
            .text("description", "A running shoe")
            .text("brand", "Acme")
            .text("price", price.to_string())
            .text("category", category.to_string())
            .text("countInStock", count_in_stock.to_string())
            .part("image", image))
    }

    pub async fn create_product(&self, category: &str, count_in_stock: u32, price: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.api("/products"))
            .bearer_auth(&self.admin_token)
            .multipart(self.product_form(category, count_in_stock, price)?)
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "create product failed: {}", res.status());
        Ok(res.json().await?)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.api("/users/register"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());
        Ok(res.json().await?)
    }

    pub fn order_body(&self, user: &str, items: &[(&str, u32)]) -> Value {
        let items: Vec<Value> = items
            .iter()
            .map(|(product, quantity)| json!({ "product": product, "quantity": quantity }))
            .collect();
        json!({
            "orderItems": items,
            "shippingAddress1": "1 Main St",
            "city": "Paris",
            "zip": "75001",
            "country": "FR",
            "phone": "+33 1 23 45 67 89",
            "user": user,
        })
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap_or_default().to_string()
}
