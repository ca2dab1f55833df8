use crate::{middleware::session_gate::session_gate, sse::handler::sse_handler, AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::controller::{
    health_check_controller, message_controller, session_controller, user_session_controller,
    webhook_controller,
};

/// Every route sits behind the session gate, including the static fallback,
/// so page loads are redirected the same way API calls are.
pub fn define_routes(app_state: AppState) -> Router {
    gated(app_routes(app_state.clone()), app_state)
}

pub(crate) fn app_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(session_routes())
        .merge(user_session_routes(app_state.clone()))
        .merge(message_routes(app_state.clone()))
        .merge(sse_routes(app_state.clone()))
        .merge(webhook_routes(app_state.clone()))
        .fallback_service(static_files(&app_state.config.static_dir))
}

pub(crate) fn gated(router: Router, app_state: AppState) -> Router {
    router.layer(from_fn_with_state(app_state, session_gate))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn session_routes() -> Router {
    Router::new().route("/session", get(session_controller::show))
}

fn user_session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/login", post(user_session_controller::login))
        .route("/logout", post(user_session_controller::logout))
        .with_state(app_state)
}

fn message_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/messages/unread_count",
            get(message_controller::unread_count),
        )
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sse", get(sse_handler))
        .with_state(app_state)
}

/// Routes for the hosted database webhook (no session needed - validated by signature)
fn webhook_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/webhooks/messages",
            post(webhook_controller::message_change),
        )
        .with_state(app_state)
}

// Serves the built frontend bundle for everything the API doesn't claim
fn static_files(static_dir: &str) -> ServeDir {
    ServeDir::new(static_dir)
}
