#![allow(dead_code)]

use chrono::Duration;
use reqwest::{header, Client};
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use tempfile::TempDir;

use shop_catalog::config::Config;
use shop_catalog::middleware::auth::{generate_token, Role};
use shop_catalog::{build_app, connect};

pub const SECRET: &str = "integration-secret";

/// A scratch database and upload directory, removed when dropped.
pub struct TestEnv {
    pub dir: TempDir,
    pub db: DatabaseConnection,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = connect(&database_url(&dir))
            .await
            .expect("Failed to open test database");
        TestEnv { dir, db }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn config(&self) -> Config {
        Config {
            database_url: database_url(&self.dir),
            bind_addr: "127.0.0.1:0".to_string(),
            secret: SECRET.to_string(),
            upload_dir: self.upload_dir(),
            file_size_limit: 1024 * 1024,
        }
    }
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("catalog.db").display())
}

/// A running server plus a client that talks to it.
pub struct TestServer {
    pub env: TestEnv,
    pub base: String,
    pub client: Client,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let env = TestEnv::new().await;
        let app = build_app(env.db.clone(), &env.config());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        TestServer {
            env,
            base: format!("http://{addr}"),
            client: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn admin_headers(&self) -> header::HeaderMap {
        let token = generate_token(SECRET, "test-admin", Role::Admin, Duration::hours(1))
            .expect("Failed to generate token");
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))
                .expect("Failed to insert header"),
        );
        headers
    }
}
