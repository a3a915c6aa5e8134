use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use murmur_api::auth::AppState;
use murmur_api::credentials::{CredentialStore, HashParams};
use murmur_db::Database;
use murmur_gateway::hub::Hub;
use murmur_server::config::Config;
use murmur_types::api::HistoryEntry;

fn setup_with(config: Config) -> (AppState, Router) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let params = HashParams::new(HashParams::MIN_M_COST, 1, 1, None).unwrap();
    let credentials = CredentialStore::with_params(db.clone(), params);
    let state = murmur_server::build_state_with(&config, credentials, db);
    let app = murmur_server::app(state.clone(), Hub::new());
    (state, app)
}

fn setup() -> (AppState, Router) {
    setup_with(Config::default())
}

fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(res: &Response<Body>) -> &str {
    res.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookie(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

/// The `name=value` part of a Set-Cookie header, ready to send back.
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

async fn body_json<T: serde::de::DeserializeOwned>(res: Response<Body>) -> T {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let body = format!("username={}&password={}", username, password);
    let res = app.clone().oneshot(form_post("/newuser", &body, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/");
    cookie_pair(&set_cookie(&res).expect("registration sets a session cookie"))
}

#[tokio::test]
async fn anonymous_index_redirects_to_signin() {
    let (_state, app) = setup();

    for path in ["/", "/api/messages", "/api/display-name", "/socket"] {
        let res = app.clone().oneshot(get(path, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND, "{}", path);
        assert_eq!(location(&res), "/signin");
    }
}

#[tokio::test]
async fn public_pages_render_without_a_session() {
    let (_state, app) = setup();

    for path in ["/signin", "/newuser", "/health"] {
        let res = app.clone().oneshot(get(path, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{}", path);
    }
}

#[tokio::test]
async fn registration_signs_the_user_in() {
    let (_state, app) = setup();
    let body = "username=alice&password=wonderland";

    let res = app.clone().oneshot(form_post("/newuser", body, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/");

    let raw = set_cookie(&res).unwrap();
    assert!(raw.starts_with("murmur.sid="));
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("Path=/"));
    assert!(raw.contains("Max-Age=2678400"));
    assert!(!raw.contains("Secure"));

    let res = app.oneshot(get("/", Some(&cookie_pair(&raw)))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_registration_bounces_back_to_the_form() {
    let (_state, app) = setup();
    register(&app, "alice", "first").await;

    let res = app
        .oneshot(form_post("/newuser", "username=alice&password=second", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/newuser");
    assert!(set_cookie(&res).is_none());
}

#[tokio::test]
async fn empty_registration_is_refused() {
    let (state, app) = setup();

    let res = app
        .oneshot(form_post("/newuser", "username=%20%20&password=pw", None))
        .await
        .unwrap();
    assert_eq!(location(&res), "/newuser");
    assert!(!state.credentials.find_user("").unwrap());
}

#[tokio::test]
async fn wrong_password_leaves_the_session_anonymous() {
    let (_state, app) = setup();
    register(&app, "alice", "wonderland").await;

    let res = app
        .clone()
        .oneshot(form_post("/signin", "username=alice&password=guess", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/signin");
    assert!(set_cookie(&res).is_none());
}

#[tokio::test]
async fn unknown_user_and_wrong_password_get_the_same_answer() {
    let (_state, app) = setup();
    register(&app, "alice", "wonderland").await;

    let wrong = app
        .clone()
        .oneshot(form_post("/signin", "username=alice&password=guess", None))
        .await
        .unwrap();
    let unknown = app
        .oneshot(form_post("/signin", "username=mallory&password=guess", None))
        .await
        .unwrap();

    assert_eq!(wrong.status(), unknown.status());
    assert_eq!(location(&wrong), location(&unknown));
    assert_eq!(set_cookie(&wrong), set_cookie(&unknown));
}

#[tokio::test]
async fn sign_in_trims_the_username_and_rotates_the_token() {
    let (state, app) = setup();
    let first = register(&app, "alice", "wonderland").await;

    let res = app
        .clone()
        .oneshot(form_post(
            "/signin",
            "username=%20alice%20&password=wonderland",
            Some(&first),
        ))
        .await
        .unwrap();
    assert_eq!(location(&res), "/");
    let second = cookie_pair(&set_cookie(&res).unwrap());
    assert_ne!(first, second);

    // The registration session was replaced, not kept alongside.
    assert_eq!(state.sessions.len().await, 1);
    let res = app.clone().oneshot(get("/", Some(&first))).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    let res = app.oneshot(get("/", Some(&second))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn sign_out_ends_the_session() {
    let (state, app) = setup();
    let cookie = register(&app, "alice", "wonderland").await;

    let res = app
        .clone()
        .oneshot(form_post("/signout", "", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/signin");
    assert!(set_cookie(&res).unwrap().contains("Max-Age=0"));
    assert!(state.sessions.is_empty().await);

    let res = app.oneshot(get("/", Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn history_starts_at_the_readers_join_date() {
    let (state, app) = setup();
    let alice = register(&app, "alice", "pw").await;
    let bob = register(&app, "bob", "pw").await;
    assert!(state.messages.add_message("bob", "hi").unwrap());
    let carol = register(&app, "carol", "pw").await;

    let res = app.clone().oneshot(get("/api/messages", Some(&alice))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let history: Vec<HistoryEntry> = body_json(res).await;
    assert_eq!(
        history,
        vec![HistoryEntry {
            display_name: "bob".into(),
            username: "bob".into(),
            body: "hi".into(),
        }]
    );

    let res = app.clone().oneshot(get("/api/messages", Some(&bob))).await.unwrap();
    let history: Vec<HistoryEntry> = body_json(res).await;
    assert_eq!(history.len(), 1);

    let res = app.oneshot(get("/api/messages", Some(&carol))).await.unwrap();
    let history: Vec<HistoryEntry> = body_json(res).await;
    assert!(history.is_empty());
}

#[tokio::test]
async fn display_name_round_trip_over_http() {
    let (_state, app) = setup();
    let cookie = register(&app, "alice", "pw").await;

    let res = app.clone().oneshot(get("/api/display-name", Some(&cookie))).await.unwrap();
    let body: serde_json::Value = body_json(res).await;
    assert_eq!(body["display_name"], "alice");

    let req = Request::builder()
        .method("POST")
        .uri("/api/display-name")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from(r#"{"display_name":"Alice L."}"#))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app.clone().oneshot(get("/api/display-name", Some(&cookie))).await.unwrap();
    let body: serde_json::Value = body_json(res).await;
    assert_eq!(body["display_name"], "Alice L.");

    let req = Request::builder()
        .method("POST")
        .uri("/api/display-name")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from(r#"{"display_name":"   "}"#))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn secure_cookie_is_configurable() {
    let config = Config {
        cookie_secure: true,
        cookie_name: "chat.sid".into(),
        ..Config::default()
    };
    let (_state, app) = setup_with(config);

    let res = app
        .oneshot(form_post("/newuser", "username=alice&password=pw", None))
        .await
        .unwrap();
    let raw = set_cookie(&res).unwrap();
    assert!(raw.starts_with("chat.sid="));
    assert!(raw.contains("Secure"));
}

#[tokio::test]
async fn form_posts_redirect_with_302() {
    let (_state, app) = setup();

    let cases = [
        ("/newuser", "username=alice&password=pw", "/"),
        ("/newuser", "username=alice&password=pw", "/newuser"),
        ("/signin", "username=alice&password=pw", "/"),
        ("/signin", "username=alice&password=nope", "/signin"),
        ("/signout", "", "/signin"),
    ];
    for (path, body, expected) in cases {
        let res = app.clone().oneshot(form_post(path, body, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND, "{} {}", path, body);
        assert_eq!(location(&res), expected, "{} {}", path, body);
    }
}
