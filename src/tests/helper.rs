use axum::Router;
use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::COOKIE;
use http_body_util::BodyExt;
use serde_json::Value;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::create_router;
use crate::storage::Memory;
use crate::storage::Storage;

/// A fully wired app over in-memory storage
///
/// The storage handle is kept around so tests can look at what the HTTP
/// surface never exposes, the stored OTP most of all
pub struct TestApp {
    pub router: Router,
    pub storage: Memory,
}

/// Setup the Pine app for a test
pub fn setup_test_app() -> TestApp {
    let config = AppConfig {
        address: "127.0.0.1:0".parse().expect("Valid test address"),
        jwt_secret: "verysecret".to_string(),
        smtp: None,
    };

    let storage = Memory::new();

    TestApp {
        router: create_router(storage.clone(), &config),
        storage,
    }
}

/// Fire a request and return status, headers and parsed body
pub async fn send_full(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = if let Some(body) = body {
        builder
            .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.router.clone().oneshot(request).await.unwrap();

    let status_code = response.status();
    let headers = response.headers().clone();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status_code, headers, body)
}

/// Fire a request and return status and parsed body
pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status_code, _, body) = send_full(app, method, uri, token, body).await;

    (status_code, body)
}

/// Fire a request carrying the session cookie instead of a bearer header
pub async fn send_with_cookie(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(COOKIE, format!("auth_token={token}"))
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    let status_code = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status_code, body)
}

pub async fn signup(
    app: &TestApp,
    name: &str,
    email: &str,
    password: &str,
) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": password })),
    )
    .await
}

pub async fn verify_otp(app: &TestApp, email: &str, otp: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/verify-otp",
        None,
        Some(json!({ "email": email, "otp": otp })),
    )
    .await
}

pub async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

/// The OTP currently installed on a user, read straight from storage
pub async fn stored_otp(app: &TestApp, email: &str) -> String {
    app.storage
        .find_user_by_email(email)
        .await
        .unwrap()
        .expect("User exists")
        .otp_code
        .expect("User has an OTP installed")
}

/// Walk a user through signup, verification and login, return the token
pub async fn register_and_login(app: &TestApp, name: &str, email: &str, password: &str) -> String {
    let (status_code, _) = signup(app, name, email, password).await;
    assert_eq!(StatusCode::OK, status_code);

    let otp = stored_otp(app, email).await;

    let (status_code, _) = verify_otp(app, email, &otp).await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, body) = login(app, email, password).await;
    assert_eq!(StatusCode::OK, status_code);

    body["data"]["token"]
        .as_str()
        .expect("Login returns a token")
        .to_string()
}

pub async fn create_collection(
    app: &TestApp,
    token: &str,
    name: &str,
) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/collections/create-new",
        Some(token),
        Some(json!({ "name": name, "color": "#aabbcc" })),
    )
    .await
}

pub async fn create_mood(app: &TestApp, token: &str, name: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/moods/create-new",
        Some(token),
        Some(json!({ "name": name, "color": "#ffcc00", "emoji": "🙂" })),
    )
    .await
}

pub async fn create_entry(app: &TestApp, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, "/entries/create-new", Some(token), Some(body)).await
}

pub async fn create_chapter(app: &TestApp, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, "/chapters/create-new", Some(token), Some(body)).await
}

pub async fn entry_detail(app: &TestApp, token: &str, id: &Uuid) -> (StatusCode, Value) {
    send(
        app,
        Method::GET,
        &format!("/entries/details/{id}"),
        Some(token),
        None,
    )
    .await
}

pub async fn list_chapters(app: &TestApp, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, "/chapters/all", Some(token), None).await
}

/// The ID of the record in a `{"data": {...}}` response
pub fn data_id(body: &Value) -> Uuid {
    body["data"]["id"]
        .as_str()
        .map(Uuid::parse_str)
        .expect("Response has an id")
        .expect("The id is a UUID")
}

/// The error message of a failed response
pub fn error_message(body: &Value) -> &str {
    body["error"].as_str().expect("Response has an error")
}

/// The names in a list of collection payloads, order-insensitive
pub fn collection_names(collections: &Value) -> Vec<String> {
    let mut names = collections
        .as_array()
        .expect("Collections are a list")
        .iter()
        .map(|collection| collection["name"].as_str().unwrap().to_string())
        .collect::<Vec<String>>();
    names.sort();

    names
}
