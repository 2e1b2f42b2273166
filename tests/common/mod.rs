#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use shortlink::{
    ServerConfig, create_app,
    db::{Database, NewUser, User},
    password::hash_password,
    token::{TokenCodec, TokenDurations},
};
use std::path::{Path, PathBuf};
use tower::ServiceExt;

pub const TEST_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
pub const TEST_PASSWORD: &str = "hunter22";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    /// Same key as the app, for minting tokens directly.
    pub codec: TokenCodec,
}

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> TestApp {
    create_test_app_with_rate(1000).await
}

/// Create a test app allowing `per_minute` signup and login attempts per client.
pub async fn create_test_app_with_rate(per_minute: u32) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        token_key: TEST_KEY.to_vec(),
        durations: TokenDurations::default(),
        client_ip_header: None,
        auth_rate_per_minute: per_minute,
    };
    TestApp {
        app: create_app(&config).expect("Failed to create app"),
        db,
        codec: TokenCodec::new(TEST_KEY).unwrap(),
    }
}

/// A test app backed by a database file, so a second connection can alter
/// the schema underneath it.
pub struct FileTestApp {
    pub test: TestApp,
    pub path: PathBuf,
}

impl FileTestApp {
    pub async fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "shortlink-{}-{}.db",
            name,
            std::process::id()
        ));
        remove_db_files(&path);

        let db = Database::open(path.to_str().unwrap())
            .await
            .expect("Failed to open test database");
        let config = ServerConfig {
            db: db.clone(),
            token_key: TEST_KEY.to_vec(),
            durations: TokenDurations::default(),
            client_ip_header: None,
            auth_rate_per_minute: 1000,
        };
        Self {
            test: TestApp {
                app: create_app(&config).expect("Failed to create app"),
                db,
                codec: TokenCodec::new(TEST_KEY).unwrap(),
            },
            path,
        }
    }

    /// Drop `table` through a separate connection.
    pub async fn drop_table(&self, table: &str) {
        let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", self.path.display()))
            .await
            .unwrap();
        sqlx::query(&format!("DROP TABLE {}", table))
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }
}

impl Drop for FileTestApp {
    fn drop(&mut self) {
        remove_db_files(&self.path);
    }
}

fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

/// Insert a user with [`TEST_PASSWORD`] directly into the database.
pub async fn create_user(db: &Database, username: &str) -> User {
    let hashed_password = hash_password(TEST_PASSWORD).unwrap();
    let email = format!("{}@example.com", username);
    db.users()
        .create(NewUser {
            username,
            hashed_password: &hashed_password,
            first_name: "Test",
            last_name: "User",
            email: &email,
        })
        .await
        .unwrap()
}

/// Build a request with an optional JSON body and bearer token.
pub fn request(method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and return the status and JSON body (Null if empty or not JSON).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Log in through the API and return the response body.
pub async fn login(app: &Router, username: &str) -> Value {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/users/login",
            Some(serde_json::json!({ "username": username, "password": TEST_PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

pub fn str_field<'a>(body: &'a Value, field: &str) -> &'a str {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing field {} in {}", field, body))
}
