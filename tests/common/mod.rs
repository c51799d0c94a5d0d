#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use recipe_backend::db::schema::ensure_schema;
use recipe_backend::server::config::ServerConfig;
use recipe_backend::services::auth_service;
use recipe_backend::web::create_axum_router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "testpass123";

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub media_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let media_dir = TempDir::new().unwrap();
        let config = Arc::new(ServerConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            media_dir: media_dir.path().to_string_lossy().into_owned(),
            log_dir: media_dir.path().to_string_lossy().into_owned(),
            token_ttl_hours: 1,
            bcrypt_cost: 4,
            max_upload_bytes: 1024 * 1024,
            max_db_connections: 1,
        });

        // One connection keeps every query on the same in-memory database
        let mut opt = ConnectOptions::new(config.database_url.clone());
        opt.max_connections(config.max_db_connections).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        ensure_schema(&db).await.unwrap();

        let router = create_axum_router(db.clone(), config.clone());
        TestApp {
            router,
            db,
            config,
            media_dir,
        }
    }

    /// Registers a user through the API and returns a token for it.
    pub async fn create_user(&self, email: &str) -> String {
        let (status, _) = self
            .request(
                Method::POST,
                "/api/user/",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD, "name": "Test User" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        self.token_for(email).await
    }

    pub async fn token_for(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/user/token/",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    pub fn user_id(&self, token: &str) -> i32 {
        auth_service::decode_token(token, &self.config.jwt_secret)
            .unwrap()
            .user_id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Posts a single multipart file field.
    pub async fn upload(&self, uri: &str, token: &str, field: &str, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let boundary = "X-TEST-BOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }
}

pub fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(10, 10));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

pub fn names(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}
