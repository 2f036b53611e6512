use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use cms_hub::api;
use cms_hub_core::auth::{CredentialStore, Hs256Tokens};
use cms_hub_core::storage::DocumentStore;
use serde_json::{json, Value};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::util::ServiceExt;

fn setup_app() -> (Router, TempDir) {
    let tempdir = tempfile::tempdir().unwrap();
    let credentials =
        Arc::new(CredentialStore::load(tempdir.path().join("private/users.json")).unwrap());
    let store = DocumentStore::new(tempdir.path().join("data"), credentials.clone()).unwrap();
    let tokens = Arc::new(Hs256Tokens::new("test-secret"));
    let app = api::router(Arc::new(RwLock::new(store)), credentials, tokens);
    (app, tempdir)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let (status, bytes) = send(app, req).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn sign_up(app: &Router) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "username": "admin", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn server_health_endpoint() {
    let (app, _dir) = setup_app();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.into_make_service()).into_future());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let resp = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");

    server.abort();
}

#[tokio::test]
async fn anonymous_cannot_create() {
    let (app, _dir) = setup_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/docs",
        None,
        Some(json!({ "name": "a.txt", "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("signed in"));

    let (status, body) = send_json(&app, "GET", "/docs", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"], json!([]));
}

#[tokio::test]
async fn forged_token_is_treated_as_anonymous() {
    let (app, _dir) = setup_app();
    let forged = Hs256Tokens::new("someone-else").issue("admin").unwrap();
    let (status, _) = send_json(
        &app,
        "POST",
        "/docs",
        Some(&forged),
        Some(json!({ "name": "a.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_in_checks_password() {
    let (app, _dir) = setup_app();
    sign_up(&app).await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/users/signin",
        None,
        Some(json!({ "username": "admin", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials.");

    let (status, body) = send_json(
        &app,
        "POST",
        "/users/signin",
        None,
        Some(json!({ "username": "admin", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, _) = send_json(
        &app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "username": "admin", "password": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn document_lifecycle() {
    let (app, _dir) = setup_app();
    let token = sign_up(&app).await;
    let token = Some(token.as_str());

    let (status, body) = send_json(
        &app,
        "POST",
        "/docs",
        token,
        Some(json!({ "name": "notes.md", "content": "# Hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "notes.md");
    assert_eq!(body["notices"], json!(["notes.md has been created."]));

    let (status, body) = send_json(&app, "GET", "/docs/notes.md", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "markdown");
    assert_eq!(body["content"], "# Hi");

    let (_, body) = send_json(&app, "GET", "/docs", None, None).await;
    assert_eq!(body["documents"], json!(["notes.md"]));

    let (status, body) = send_json(
        &app,
        "PUT",
        "/docs/notes.md",
        token,
        Some(json!({ "content": "# Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notices"], json!(["notes.md has been updated."]));

    let (_, versions) = send_json(&app, "GET", "/docs/notes.md/versions", None, None).await;
    let versions = versions.as_array().unwrap().clone();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["content"], "# Hi");
    assert_eq!(versions[1]["content"], "# Hello");

    let first = versions[0]["timestamp"].as_str().unwrap().replace(' ', "%20");
    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/docs/notes.md/versions/{}", first),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "# Hi");

    let (status, body) = send_json(&app, "DELETE", "/docs/notes.md", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notices"], json!(["notes.md has been deleted."]));

    let (_, body) = send_json(&app, "GET", "/docs", None, None).await;
    assert_eq!(body["documents"], json!([]));
    let (status, body) = send_json(&app, "GET", "/docs/notes.md", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "notes.md does not exist");
}

#[tokio::test]
async fn rename_duplicate_and_error_mapping() {
    let (app, _dir) = setup_app();
    let token = sign_up(&app).await;
    let token = Some(token.as_str());

    let (status, _) = send_json(
        &app,
        "POST",
        "/docs",
        token,
        Some(json!({ "name": "report.txt", "content": "numbers" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(&app, "POST", "/docs/report.txt/duplicate", token, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "report copy.txt");

    let (status, body) = send_json(&app, "GET", "/docs/report%20copy.txt", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "numbers");

    let (status, _) = send_json(
        &app,
        "PUT",
        "/docs/report.txt",
        token,
        Some(json!({ "new_name": "report.md" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send_json(
        &app,
        "PUT",
        "/docs/report.txt",
        token,
        Some(json!({ "new_name": "report copy.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send_json(
        &app,
        "PUT",
        "/docs/report.txt",
        token,
        Some(json!({ "new_name": "summary.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "summary.txt");

    let (_, body) = send_json(&app, "GET", "/docs", None, None).await;
    assert_eq!(body["documents"], json!(["report copy.txt", "summary.txt"]));

    let (status, _) = send_json(
        &app,
        "POST",
        "/docs",
        token,
        Some(json!({ "name": "script.rb" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn uploaded_images_are_served_raw() {
    let (app, _dir) = setup_app();
    let token = sign_up(&app).await;
    let png: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a];

    let req = Request::builder()
        .method("PUT")
        .uri("/uploads/logo.png")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(png.to_vec()))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/docs/logo.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], png);
}
