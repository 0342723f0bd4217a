//! HTTP flows against an in-memory database

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use super::{build_router, AppState};
use crate::config::Config;
use crate::db::{create_test_pool, migrations};
use crate::services::user::test_support::RecordingMailer;

struct TestApp {
    server: TestServer,
    mailer: Arc<RecordingMailer>,
    _storage: TempDir,
}

async fn setup() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let storage = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.path = storage.path().to_path_buf();
    config.server.public_url = "https://meteor.example".to_string();

    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(pool, &config, mailer.clone());
    let router = build_router(state, &config.server.cors_origin).unwrap();

    TestApp {
        server: TestServer::new(router).unwrap(),
        mailer,
        _storage: storage,
    }
}

impl TestApp {
    /// Register and return the bearer token
    async fn register(&self, email: &str, age: i32, country: &str) -> String {
        let response = self
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": email,
                "password": "password123",
                "full_name": format!("Reader {}", email),
                "age": age,
                "country": country,
                "consent": true,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    async fn create_book(&self, admin: &str, title: &str, group: &str) -> i64 {
        let response = self
            .server
            .post("/api/v1/admin/books")
            .authorization_bearer(admin)
            .json(&json!({
                "title": title,
                "age_group": group,
                "price_amount": 10,
                "price_currency": "USD",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    async fn create_chapter(&self, admin: &str, book_id: i64, title: &str, number: i32) -> i64 {
        let response = self
            .server
            .post(&format!("/api/v1/admin/books/{}/chapters", book_id))
            .authorization_bearer(admin)
            .json(&json!({ "title": title, "chapter_number": number }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }
}

fn titles(chapters: &Value) -> Vec<(String, i64)> {
    chapters
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["title"].as_str().unwrap().to_string(),
                c["order_index"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let response = app.server.get("/api/v1/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_first_account_is_admin_and_roles_are_enforced() {
    let app = setup().await;
    let admin = app.register("staff@example.com", 24, "India").await;
    let reader = app.register("reader@example.com", 15, "India").await;

    let me = app.server.get("/api/v1/auth/me").authorization_bearer(&admin).await;
    me.assert_status_ok();
    let me = me.json::<Value>();
    assert_eq!(me["user"]["role"], "admin");
    assert!(me["user"].get("password_hash").is_none());

    app.server
        .get("/api/v1/admin/books")
        .authorization_bearer(&reader)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get("/api/v1/books")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let duplicate = app
        .server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "READER@example.com",
            "password": "password123",
            "full_name": "Copy",
            "age": 15,
            "consent": true,
        }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_catalog_is_filtered_by_age_group_and_locale() {
    let app = setup().await;
    let admin = app.register("staff@example.com", 24, "India").await;
    let teen_book = app.create_book(&admin, "Teen Novel", "teens").await;
    let kids_book = app.create_book(&admin, "Picture Book", "preteens").await;

    let indian_teen = app.register("in@example.com", 15, "India").await;
    let us_teen = app.register("us@example.com", 16, "USA").await;

    let books = app.server.get("/api/v1/books").authorization_bearer(&indian_teen).await;
    books.assert_status_ok();
    let books = books.json::<Value>();
    assert_eq!(books.as_array().unwrap().len(), 1);
    assert_eq!(books[0]["id"].as_i64(), Some(teen_book));
    assert!(books[0]["price"].is_null());

    let books = app
        .server
        .get("/api/v1/books")
        .authorization_bearer(&us_teen)
        .await
        .json::<Value>();
    assert_eq!(books[0]["price"], "USD 10");

    let searched = app
        .server
        .get("/api/v1/books?search=zzz")
        .authorization_bearer(&us_teen)
        .await
        .json::<Value>();
    assert!(searched.as_array().unwrap().is_empty());

    app.server
        .get(&format!("/api/v1/books/{}", kids_book))
        .authorization_bearer(&us_teen)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chapter_reordering() {
    let app = setup().await;
    let admin = app.register("staff@example.com", 24, "India").await;
    let book = app.create_book(&admin, "Saga", "teens").await;
    let a = app.create_chapter(&admin, book, "A", 1).await;
    let b = app.create_chapter(&admin, book, "B", 2).await;
    app.create_chapter(&admin, book, "C", 3).await;

    let moved = app
        .server
        .post(&format!("/api/v1/admin/chapters/{}/move", b))
        .authorization_bearer(&admin)
        .json(&json!({ "direction": "up" }))
        .await;
    moved.assert_status_ok();
    assert_eq!(
        titles(&moved.json::<Value>()),
        vec![("B".to_string(), 1), ("A".to_string(), 2), ("C".to_string(), 3)]
    );

    let boundary = app
        .server
        .post(&format!("/api/v1/admin/chapters/{}/move", b))
        .authorization_bearer(&admin)
        .json(&json!({ "direction": "up" }))
        .await;
    boundary.assert_status_ok();
    assert_eq!(titles(&boundary.json::<Value>())[0], ("B".to_string(), 1));

    app.server
        .post(&format!("/api/v1/admin/chapters/{}/move", a))
        .authorization_bearer(&admin)
        .json(&json!({ "direction": "sideways" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .delete(&format!("/api/v1/admin/chapters/{}", a))
        .authorization_bearer(&admin)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let remaining = app
        .server
        .get(&format!("/api/v1/admin/books/{}/chapters", book))
        .authorization_bearer(&admin)
        .await
        .json::<Value>();
    assert_eq!(
        titles(&remaining),
        vec![("B".to_string(), 1), ("C".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_reader_opens_chapter_with_navigation() {
    let app = setup().await;
    let admin = app.register("staff@example.com", 24, "India").await;
    let book = app.create_book(&admin, "Saga", "teens").await;
    app.create_chapter(&admin, book, "One", 1).await;
    let second = app.create_chapter(&admin, book, "Two", 2).await;
    let reader = app.register("reader@example.com", 14, "India").await;

    let reading = app
        .server
        .get(&format!("/api/v1/chapters/{}", second))
        .authorization_bearer(&reader)
        .await;
    reading.assert_status_ok();
    let reading = reading.json::<Value>();
    assert_eq!(reading["navigation"]["position"], 2);
    assert_eq!(reading["navigation"]["previous"]["title"], "One");
    assert!(reading["navigation"]["next"].is_null());
}

#[tokio::test]
async fn test_feedback_round_trip() {
    let app = setup().await;
    let admin = app.register("staff@example.com", 24, "India").await;
    let reader = app.register("reader@example.com", 14, "India").await;

    let blank = app
        .server
        .post("/api/v1/inquiries/feedback")
        .authorization_bearer(&reader)
        .json(&json!({ "text": "   " }))
        .await;
    blank.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(blank.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

    let posted = app
        .server
        .post("/api/v1/inquiries/feedback")
        .authorization_bearer(&reader)
        .json(&json!({ "text": "More comics please" }))
        .await;
    posted.assert_status(StatusCode::CREATED);
    let id = posted.json::<Value>()["id"].as_i64().unwrap();

    app.server
        .put(&format!("/api/v1/admin/inquiries/feedback/{}/response", id))
        .authorization_bearer(&admin)
        .json(&json!({ "response": "Coming soon!" }))
        .await
        .assert_status_ok();

    let mine = app
        .server
        .get("/api/v1/inquiries/feedback")
        .authorization_bearer(&reader)
        .await
        .json::<Value>();
    assert_eq!(mine[0]["admin_response"], "Coming soon!");

    app.server
        .get("/api/v1/inquiries/complaints")
        .authorization_bearer(&reader)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_access_rules() {
    let app = setup().await;
    let admin = app.register("staff@example.com", 24, "India").await;
    let reader = app.register("reader@example.com", 14, "India").await;

    let form = || {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(b"my story".to_vec())
                .file_name("story.txt")
                .mime_type("text/plain"),
        )
    };

    let uploaded = app
        .server
        .post("/api/v1/storage/activity_files")
        .authorization_bearer(&reader)
        .multipart(form())
        .await;
    uploaded.assert_status(StatusCode::CREATED);
    let url = uploaded.json::<Value>()["url"].as_str().unwrap().to_string();

    app.server
        .post("/api/v1/storage/book_covers")
        .authorization_bearer(&reader)
        .multipart(form())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server.get(&url).await.assert_status(StatusCode::UNAUTHORIZED);
    let download = app.server.get(&url).authorization_bearer(&reader).await;
    download.assert_status_ok();
    assert_eq!(&download.as_bytes()[..], b"my story");
    assert_eq!(download.header("x-content-type-options"), "nosniff");
    let disposition = download.header("content-disposition");
    assert!(disposition.to_str().unwrap().starts_with("attachment"));

    let drawing = app
        .server
        .post("/api/v1/storage/activity_files")
        .authorization_bearer(&reader)
        .multipart(MultipartForm::new().add_part(
            "file",
            Part::bytes(b"<svg><script>fetch('/api')</script></svg>".to_vec())
                .file_name("x.svg")
                .mime_type("image/svg+xml"),
        ))
        .await;
    drawing.assert_status(StatusCode::CREATED);
    let drawing_url = drawing.json::<Value>()["url"].as_str().unwrap().to_string();
    let opened = app.server.get(&drawing_url).authorization_bearer(&admin).await;
    opened.assert_status_ok();
    assert_eq!(opened.header("x-content-type-options"), "nosniff");
    assert!(opened
        .header("content-disposition")
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let cover = app
        .server
        .post("/api/v1/storage/book_covers")
        .authorization_bearer(&admin)
        .multipart(MultipartForm::new().add_part(
            "file",
            Part::bytes(b"png".to_vec()).file_name("cover.png").mime_type("image/png"),
        ))
        .await;
    cover.assert_status(StatusCode::CREATED);
    let cover_url = cover.json::<Value>()["url"].as_str().unwrap().to_string();
    let cover = app.server.get(&cover_url).await;
    cover.assert_status_ok();
    assert_eq!(cover.header("x-content-type-options"), "nosniff");
    assert!(cover.maybe_header("content-disposition").is_none());

    let listed = app
        .server
        .get("/api/v1/admin/storage/activity_files")
        .authorization_bearer(&admin)
        .await
        .json::<Value>();
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_password_reset_and_logout() {
    let app = setup().await;
    let token = app.register("forgot@example.com", 20, "India").await;

    app.server
        .post("/api/v1/auth/password-reset")
        .json(&json!({ "email": "nobody@example.com" }))
        .await
        .assert_status_ok();
    app.server
        .post("/api/v1/auth/password-reset")
        .json(&json!({ "email": "forgot@example.com" }))
        .await
        .assert_status_ok();
    let reset = app.mailer.last_token().expect("reset mail sent");

    app.server
        .post("/api/v1/auth/password-reset/confirm")
        .json(&json!({
            "token": reset,
            "password": "fresh-pass",
            "confirm_password": "fresh-pass",
        }))
        .await
        .assert_status_ok();

    app.server
        .get("/api/v1/auth/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let login = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "forgot@example.com", "password": "fresh-pass" }))
        .await;
    login.assert_status_ok();
    let session = login.json::<Value>()["token"].as_str().unwrap().to_string();

    app.server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&session)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get("/api/v1/dashboard")
        .authorization_bearer(&session)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
