//! Fakes and request helpers shared by the router-level tests.

use crate::extractors::current_subject::CurrentSubject;
use crate::middleware::session_gate::CREDENTIALS_KEY;
use crate::router::{app_routes, gated};
use crate::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::routing::get as get_route;
use axum::Router;
use domain::credential::{AuthProvider, CredentialResolver};
use domain::error::{CredentialErrorKind, Error as DomainError};
use domain::message::UnreadCountStore;
use domain::route_policy::RoutePolicy;
use domain::session::{Credentials, Resolution};
use domain::Id;
use service::config::Config;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

pub(crate) const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// What the fake provider does on one `resolve` call.
pub(crate) enum Behavior {
    Accept(Id),
    Refresh(Id, Credentials),
    Reject,
    Fail,
    Hang,
}

/// Plays back queued behaviors, then accepts as `fallback_subject`.
pub(crate) struct FakeAuthProvider {
    behaviors: Mutex<VecDeque<Behavior>>,
    fallback_subject: Id,
    reject_sign_in: bool,
    resolve_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl FakeAuthProvider {
    pub(crate) fn new(behaviors: Vec<Behavior>) -> Self {
        let fallback_subject = behaviors
            .iter()
            .find_map(|behavior| match behavior {
                Behavior::Accept(id) | Behavior::Refresh(id, _) => Some(*id),
                _ => None,
            })
            .unwrap_or_else(Id::new_v4);

        Self {
            behaviors: Mutex::new(behaviors.into()),
            fallback_subject,
            reject_sign_in: false,
            resolve_calls: AtomicUsize::new(0),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn rejecting_sign_in(mut self) -> Self {
        self.reject_sign_in = true;
        self
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialResolver for FakeAuthProvider {
    async fn resolve(&self, _credentials: &Credentials) -> Result<Resolution, DomainError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behaviors.lock().unwrap().pop_front();

        match behavior.unwrap_or(Behavior::Accept(self.fallback_subject)) {
            Behavior::Accept(id) => Ok(Resolution::authenticated(id)),
            Behavior::Refresh(id, credentials) => Ok(Resolution::refreshed(id, credentials)),
            Behavior::Reject => Err(DomainError::credential(
                CredentialErrorKind::Invalid,
                "token rejected",
            )),
            Behavior::Fail => Err(DomainError::network("provider unavailable")),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<Resolution, DomainError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_sign_in {
            return Err(DomainError::credential(
                CredentialErrorKind::Invalid,
                "invalid login credentials",
            ));
        }
        Ok(Resolution::refreshed(
            self.fallback_subject,
            Credentials::new("signed-in-access", "signed-in-refresh"),
        ))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), DomainError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns a fixed count and remembers who asked.
#[derive(Clone)]
pub(crate) struct FakeUnreadStore {
    count: u64,
    last_subject: Arc<Mutex<Option<Id>>>,
}

impl FakeUnreadStore {
    pub(crate) fn new(count: u64) -> Self {
        Self {
            count,
            last_subject: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn last_subject(&self) -> Option<Id> {
        *self.last_subject.lock().unwrap()
    }
}

#[async_trait]
impl UnreadCountStore for FakeUnreadStore {
    async fn count_unread(&self, subject_id: Id) -> Result<u64, DomainError> {
        *self.last_subject.lock().unwrap() = Some(subject_id);
        Ok(self.count)
    }
}

pub(crate) fn test_app_state(
    provider: Arc<FakeAuthProvider>,
    unread_store: FakeUnreadStore,
) -> AppState {
    let config = Config::with_defaults().set_webhook_secret(TEST_WEBHOOK_SECRET.to_string());
    let route_policy = RoutePolicy::from_config(&config).unwrap();

    AppState::new(
        config,
        route_policy,
        provider,
        Arc::new(unread_store),
        Arc::new(::sse::Manager::new()),
    )
}

/// The production routes plus a few probes, behind the gate and a session layer
/// backed by `MemoryStore`.
pub(crate) fn test_app(app_state: AppState) -> Router {
    let routes = app_routes(app_state.clone()).merge(probe_routes());

    gated(routes, app_state).layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
}

fn probe_routes() -> Router {
    Router::new()
        .route("/test/seed", get_route(seed))
        .route("/test/peek", get_route(peek))
        .route("/feed", get_route(feed))
        .route("/about", get_route(|| async { "about" }))
}

async fn seed(session: tower_sessions::Session) -> &'static str {
    session
        .insert(CREDENTIALS_KEY, Credentials::new("old-access", "old-refresh"))
        .await
        .unwrap();
    // Keeps the session non-empty once the credentials are removed.
    session.insert("seeded", true).await.unwrap();
    "seeded"
}

async fn peek(session: tower_sessions::Session) -> String {
    session
        .get::<Credentials>(CREDENTIALS_KEY)
        .await
        .unwrap()
        .map(|credentials| credentials.access_token)
        .unwrap_or_else(|| "none".to_string())
}

async fn feed(CurrentSubject(subject_id): CurrentSubject) -> String {
    subject_id.to_string()
}

pub(crate) async fn get(app: &Router, path: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().uri(path);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub(crate) async fn post_form(
    app: &Router,
    path: &str,
    body: &str,
    cookie: Option<&str>,
) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// The `name=value` pair of the session cookie set on `response`, if any.
pub(crate) fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub(crate) async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
