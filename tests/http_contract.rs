//! End-to-end checks of `HttpSessionApi` + `AuthSession` against an in-process
//! axum server speaking the session contract with a cookie session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use authsync::config::ClientConfig;
use authsync::net::api::{HttpSessionApi, SessionApi};
use authsync::net::types::{AuthError, FetchOutcome, User};
use authsync::state::auth::AuthSession;
use authsync::state::session::{Navigation, Route, SessionStatus};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;

// =============================================================================
// TEST SERVER
// =============================================================================

#[derive(Default)]
struct Backend {
    accounts: Mutex<HashMap<String, (i64, String)>>,
    sessions: Mutex<HashMap<String, User>>,
    next_id: AtomicI64,
    fail_user_fetch: AtomicBool,
    fail_logout: AtomicBool,
}

#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

impl Backend {
    fn session_token(headers: &HeaderMap) -> Option<String> {
        headers
            .get(header::COOKIE)?
            .to_str()
            .ok()?
            .split(';')
            .find_map(|pair| pair.trim().strip_prefix("sid=").map(str::to_owned))
    }

    fn open_session(&self, user: &User) -> String {
        let token = format!("tok-{}-{}", user.id, self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sessions.lock().unwrap().insert(token.clone(), user.clone());
        format!("sid={token}; Path=/; HttpOnly")
    }
}

async fn current_user(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if backend.fail_user_fetch.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    let user = Backend::session_token(&headers).and_then(|token| backend.sessions.lock().unwrap().get(&token).cloned());
    match user {
        Some(user) => Json(user).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn register(State(backend): State<Arc<Backend>>, Json(body): Json<CredentialsBody>) -> Response {
    let user = {
        let mut accounts = backend.accounts.lock().unwrap();
        if accounts.contains_key(&body.username) {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "Username already exists" })))
                .into_response();
        }
        let id = i64::try_from(accounts.len()).unwrap() + 1;
        accounts.insert(body.username.clone(), (id, body.password));
        User { id, username: body.username }
    };
    let cookie = backend.open_session(&user);
    (StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(user)).into_response()
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<CredentialsBody>) -> Response {
    let account = backend.accounts.lock().unwrap().get(&body.username).cloned();
    match account {
        Some((id, password)) if password == body.password => {
            let user = User { id, username: body.username };
            let cookie = backend.open_session(&user);
            ([(header::SET_COOKIE, cookie)], Json(user)).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "Invalid credentials" }))).into_response(),
    }
}

async fn logout(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if backend.fail_logout.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response();
    }
    if let Some(token) = Backend::session_token(&headers) {
        backend.sessions.lock().unwrap().remove(&token);
    }
    ([(header::SET_COOKIE, "sid=; Path=/; Max-Age=0")], StatusCode::OK).into_response()
}

async fn spawn_server(backend: Arc<Backend>) -> String {
    let app = Router::new()
        .route("/api/user", get(current_user))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// =============================================================================
// HELPERS
// =============================================================================

fn client(base_url: &str) -> Arc<HttpSessionApi> {
    Arc::new(HttpSessionApi::new(ClientConfig::new(base_url).unwrap()).unwrap())
}

fn new_session(api: &Arc<HttpSessionApi>, location: &str) -> (AuthSession, mpsc::UnboundedReceiver<Navigation>) {
    let api: Arc<dyn SessionApi> = api.clone();
    AuthSession::new(api, location)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Navigation>) -> Vec<Route> {
    let mut routes = Vec::new();
    while let Ok(navigation) = rx.try_recv() {
        routes.push(navigation.to);
    }
    routes
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn anonymous_visitor_is_sent_to_auth() {
    let base = spawn_server(Arc::new(Backend::default())).await;
    let api = client(&base);
    assert_eq!(api.fetch_current_user().await, FetchOutcome::Unauthenticated);

    let (session, mut nav) = new_session(&api, "/dashboard");
    assert_eq!(session.initialize().await, SessionStatus::Anonymous);
    assert!(!session.current().loading);
    assert_eq!(drain(&mut nav), vec![Route::Auth]);
}

#[tokio::test]
async fn register_sets_cookie_and_cache() {
    let base = spawn_server(Arc::new(Backend::default())).await;
    let api = client(&base);
    let (session, mut nav) = new_session(&api, "/auth");

    let user = session.register("alice", "pw").await.unwrap();
    assert_eq!(user, User { id: 1, username: "alice".to_owned() });
    assert_eq!(session.status(), SessionStatus::Authenticated(user.clone()));
    assert_eq!(drain(&mut nav), vec![Route::Home]);
    assert!(api.session_cookie().unwrap().starts_with("sid=tok-1-"));

    let (fresh, mut fresh_nav) = new_session(&api, "/");
    assert_eq!(fresh.initialize().await, SessionStatus::Authenticated(user));
    assert!(drain(&mut fresh_nav).is_empty());
}

#[tokio::test]
async fn duplicate_register_surfaces_server_error() {
    let base = spawn_server(Arc::new(Backend::default())).await;
    let api = client(&base);
    let (session, _nav) = new_session(&api, "/auth");
    session.register("alice", "pw").await.unwrap();
    let before = session.cache().snapshot();

    let err = session.register("alice", "other").await.unwrap_err();
    assert_eq!(err, AuthError::Rejected { status: 400, message: "Username already exists".to_owned() });
    assert_eq!(session.cache().snapshot(), before);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let base = spawn_server(Arc::new(Backend::default())).await;
    let api = client(&base);
    let (setup, _nav) = new_session(&api, "/auth");
    setup.register("bob", "right").await.unwrap();
    setup.logout().await.unwrap();

    let (session, mut nav) = new_session(&api, "/auth");
    session.initialize().await;
    let before = session.cache().snapshot();

    let err = session.login("bob", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(session.cache().snapshot(), before);
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(drain(&mut nav).is_empty());

    session.login("bob", "right").await.unwrap();
    assert_eq!(session.current().user.map(|u| u.username), Some("bob".to_owned()));
}

#[tokio::test]
async fn logout_ends_server_session() {
    let base = spawn_server(Arc::new(Backend::default())).await;
    let api = client(&base);
    let (session, mut nav) = new_session(&api, "/auth");
    session.register("carol", "pw").await.unwrap();

    session.logout().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(drain(&mut nav), vec![Route::Home, Route::Auth]);
    assert_eq!(api.fetch_current_user().await, FetchOutcome::Unauthenticated);
}

#[tokio::test]
async fn logout_failure_uses_default_message() {
    let backend = Arc::new(Backend::default());
    let base = spawn_server(backend.clone()).await;
    let api = client(&base);
    let (session, _nav) = new_session(&api, "/auth");
    session.register("dave", "pw").await.unwrap();

    backend.fail_logout.store(true, Ordering::SeqCst);
    let err = session.logout().await.unwrap_err();
    assert_eq!(err.message(), "Failed to log out");
    assert!(matches!(session.status(), SessionStatus::Authenticated(_)));
}

#[tokio::test]
async fn server_error_on_fetch_degrades_to_anonymous() {
    let backend = Arc::new(Backend::default());
    backend.fail_user_fetch.store(true, Ordering::SeqCst);
    let base = spawn_server(backend).await;
    let api = client(&base);

    assert!(matches!(api.fetch_current_user().await, FetchOutcome::TransientError(_)));
    let (session, mut nav) = new_session(&api, "/dashboard");
    assert_eq!(session.initialize().await, SessionStatus::Anonymous);
    assert_eq!(drain(&mut nav), vec![Route::Auth]);
}

#[tokio::test]
async fn unreachable_server_degrades_to_anonymous() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(&format!("http://{addr}"));
    let (session, mut nav) = new_session(&api, "/dashboard");
    assert_eq!(session.initialize().await, SessionStatus::Anonymous);
    assert!(!session.current().loading);
    assert_eq!(drain(&mut nav), vec![Route::Auth]);

    let err = session.login("erin", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
}

#[tokio::test]
async fn seeded_cookie_resumes_session() {
    let base = spawn_server(Arc::new(Backend::default())).await;
    let first = client(&base);
    let (session, _nav) = new_session(&first, "/auth");
    let user = session.register("frank", "pw").await.unwrap();
    let cookie = first.session_cookie().unwrap();

    let config = ClientConfig::new(&base).unwrap().with_session_cookie(&cookie).unwrap();
    let second = Arc::new(HttpSessionApi::new(config).unwrap());
    assert_eq!(second.fetch_current_user().await, FetchOutcome::Success(user));
}
