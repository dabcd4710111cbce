use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use burrow_core::{ReadRepository, ShortCode};
use burrow_gateway::{App, AppState, JwtConfig, JwtKeys};
use burrow_generator::SeqGenerator;
use burrow_shortener::{Shortener, ShortenerService};
use burrow_storage::InMemoryRepository;
use serde_json::{json, Value};
use tower::ServiceExt;

const BASE_URL: &str = "http://short.test";

struct TestApp {
    router: Router,
    repo: Arc<InMemoryRepository>,
    shortener: Arc<dyn Shortener>,
}

impl TestApp {
    fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let shortener: Arc<dyn Shortener> = Arc::new(ShortenerService::from_shared(
            Arc::clone(&repo),
            SeqGenerator::with_prefix("t"),
        ));
        let state = AppState::new(
            Arc::clone(&shortener),
            BASE_URL,
            JwtKeys::new(&JwtConfig::builder().secret("test-secret").build()),
        );

        Self {
            router: App::router(state),
            repo,
            shortener,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Makes one request without a cookie and returns the minted cookie.
    async fn login(&self) -> String {
        let response = self.send(get("/api/user/urls", None)).await;
        identity_cookie(&response).expect("identity cookie")
    }

    async fn is_deleted(&self, code: &str) -> bool {
        self.repo
            .is_deleted(&ShortCode::new_unchecked(code))
            .await
            .unwrap()
    }

    /// Polls storage until the background delete of `code` has landed.
    async fn wait_until_deleted(&self, code: &str) {
        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
            .until_async(|| async move { self.is_deleted(code).await })
            .await;
    }
}

fn identity_cookie(response: &Response<Body>) -> Option<String> {
    let header = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    header.split(';').next().map(str::to_string)
}

fn with_cookie(
    builder: axum::http::request::Builder,
    cookie: Option<&str>,
) -> axum::http::request::Builder {
    match cookie {
        Some(cookie) => builder.header(COOKIE, cookie),
        None => builder,
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    with_cookie(Request::builder().uri(uri), cookie)
        .body(Body::empty())
        .unwrap()
}

fn post_text(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    with_cookie(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "text/plain"),
        cookie,
    )
    .body(Body::from(body.to_string()))
    .unwrap()
}

fn send_json(method: Method, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    with_cookie(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json"),
        cookie,
    )
    .body(Body::from(body.to_string()))
    .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn ping_reports_healthy_storage() {
    let app = TestApp::new();

    let response = app.send(get("/ping", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn plain_text_shorten_mints_identity() {
    let app = TestApp::new();

    let response = app
        .send(post_text("/", "https://example.com/a", None))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = identity_cookie(&response).unwrap();
    assert!(cookie.starts_with("jwt="));
    assert_eq!(body_text(response).await, format!("{BASE_URL}/t000000"));

    let stored = app.repo.get(&ShortCode::new_unchecked("t000000")).await.unwrap();
    assert!(!stored.owner.is_empty());
}

#[tokio::test]
async fn plain_text_duplicate_returns_existing_link() {
    let app = TestApp::new();
    app.send(post_text("/", "https://example.com/a", None)).await;

    let response = app
        .send(post_text("/", "https://example.com/a", None))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_text(response).await, format!("{BASE_URL}/t000000"));
}

#[tokio::test]
async fn plain_text_rejects_empty_and_invalid_urls() {
    let app = TestApp::new();

    let empty = app.send(post_text("/", "", None)).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let invalid = app.send(post_text("/", "not a url", None)).await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert!(app.repo.is_empty());
}

#[tokio::test]
async fn redirect_follows_short_code() {
    let app = TestApp::new();
    app.send(post_text("/", "https://example.com/a", None)).await;

    let response = app.send(get("/t000000", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "https://example.com/a"
    );
}

#[tokio::test]
async fn redirect_of_unknown_code_is_bad_request() {
    let app = TestApp::new();

    let response = app.send(get("/missing", None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_shorten_and_duplicate() {
    let app = TestApp::new();
    let cookie = app.login().await;

    let created = app
        .send(send_json(
            Method::POST,
            "/api/shorten",
            json!({ "url": "https://example.com/a" }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(created).await,
        json!({ "result": format!("{BASE_URL}/t000000") })
    );

    let duplicate = app
        .send(send_json(
            Method::POST,
            "/api/shorten",
            json!({ "url": "https://example.com/a" }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(duplicate).await,
        json!({ "result": format!("{BASE_URL}/t000000") })
    );
}

#[tokio::test]
async fn json_shorten_requires_json_body() {
    let app = TestApp::new();

    let wrong_type = app
        .send(post_text(
            "/api/shorten",
            r#"{"url":"https://example.com/a"}"#,
            None,
        ))
        .await;
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);

    let empty_url = app
        .send(send_json(
            Method::POST,
            "/api/shorten",
            json!({ "url": "" }),
            None,
        ))
        .await;
    assert_eq!(empty_url.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_uses_correlation_ids_as_codes() {
    let app = TestApp::new();
    let cookie = app.login().await;

    let response = app
        .send(send_json(
            Method::POST,
            "/api/shorten/batch",
            json!([
                { "correlation_id": "first", "original_url": "https://example.com/1" },
                { "correlation_id": "second", "original_url": "https://example.com/2" }
            ]),
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(response).await,
        json!([
            { "correlation_id": "first", "short_url": format!("{BASE_URL}/first") },
            { "correlation_id": "second", "short_url": format!("{BASE_URL}/second") }
        ])
    );

    let listed = app.send(get("/api/user/urls", Some(&cookie))).await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(body_json(listed).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn batch_rejects_bad_codes_and_existing_urls() {
    let app = TestApp::new();
    app.send(post_text("/", "https://example.com/1", None)).await;

    let bad_code = app
        .send(send_json(
            Method::POST,
            "/api/shorten/batch",
            json!([{ "correlation_id": "has space", "original_url": "https://example.com/2" }]),
            None,
        ))
        .await;
    assert_eq!(bad_code.status(), StatusCode::BAD_REQUEST);

    let existing = app
        .send(send_json(
            Method::POST,
            "/api/shorten/batch",
            json!([{ "correlation_id": "again", "original_url": "https://example.com/1" }]),
            None,
        ))
        .await;
    assert_eq!(existing.status(), StatusCode::CONFLICT);

    let empty = app
        .send(send_json(Method::POST, "/api/shorten/batch", json!([]), None))
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_urls_need_a_cookie() {
    let app = TestApp::new();

    let response = app.send(get("/api/user/urls", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(identity_cookie(&response).is_some());
}

#[tokio::test]
async fn user_urls_lists_only_own_links() {
    let app = TestApp::new();
    let alice = app.login().await;
    let bob = app.login().await;

    let empty = app.send(get("/api/user/urls", Some(&alice))).await;
    assert_eq!(empty.status(), StatusCode::NO_CONTENT);

    app.send(post_text("/", "https://a.example", Some(&alice)))
        .await;
    app.send(post_text("/", "https://b.example", Some(&bob)))
        .await;

    let response = app.send(get("/api/user/urls", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([{ "short_url": format!("{BASE_URL}/t000000"), "original_url": "https://a.example" }])
    );
}

#[tokio::test]
async fn forged_cookie_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .send(post_text("/", "https://a.example", Some("jwt=forged.token.value")))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.repo.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_is_accepted_and_applied_in_background() {
    let app = TestApp::new();
    let cookie = app.login().await;
    app.send(post_text("/", "https://a.example", Some(&cookie)))
        .await;

    let response = app
        .send(send_json(
            Method::DELETE,
            "/api/user/urls",
            json!(["t000000"]),
            Some(&cookie),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    app.wait_until_deleted("t000000").await;

    let gone = app.send(get("/t000000", None)).await;
    assert_eq!(gone.status(), StatusCode::GONE);
}

#[tokio::test]
async fn delete_by_another_user_changes_nothing() {
    let app = TestApp::new();
    let owner = app.login().await;
    let stranger = app.login().await;
    app.send(post_text("/", "https://a.example", Some(&owner)))
        .await;

    let response = app
        .send(send_json(
            Method::DELETE,
            "/api/user/urls",
            json!(["t000000"]),
            Some(&stranger),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    app.shortener.drain_deletes().await;
    assert!(!app.is_deleted("t000000").await);
}

#[tokio::test]
async fn accepted_deletes_are_applied_once_drained() {
    let app = TestApp::new();
    let cookie = app.login().await;
    for url in ["https://a.example", "https://b.example"] {
        app.send(post_text("/", url, Some(&cookie))).await;
    }

    for id in ["t000000", "t000001"] {
        let response = app
            .send(send_json(
                Method::DELETE,
                "/api/user/urls",
                json!([id]),
                Some(&cookie),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    app.shortener.drain_deletes().await;
    assert!(app.is_deleted("t000000").await);
    assert!(app.is_deleted("t000001").await);
}

#[tokio::test]
async fn delete_rejects_malformed_body() {
    let app = TestApp::new();

    let response = app
        .send(send_json(
            Method::DELETE,
            "/api/user/urls",
            json!({ "ids": ["t000000"] }),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
