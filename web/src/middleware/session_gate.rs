use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use domain::route_policy::RedirectDecision;
use domain::session::{Credentials, Session};
use log::*;
use tokio::time::timeout;

/// Key under which the provider's token pair lives in the server-side session.
pub(crate) const CREDENTIALS_KEY: &str = "credentials";

/// Runs ahead of every route, the static fallback included.
///
/// Resolves the request's credentials into a `Session`, writes back any tokens
/// the provider rotated, then either lets the request through (with the
/// resolved `Session` in its extensions) or answers with a 303 to the path the
/// route policy chose. The write-back happens before the decision so the
/// refreshed session cookie rides on redirects as well.
pub async fn session_gate(
    State(app_state): State<AppState>,
    store: tower_sessions::Session,
    mut request: Request,
    next: Next,
) -> Response {
    let session = resolve_session(&app_state, &store).await;
    let path = request.uri().path();

    match app_state.route_policy.decide(path, &session) {
        RedirectDecision::Allow => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        RedirectDecision::RedirectTo(target) => {
            debug!(
                "Redirecting {path} to {target} (authenticated: {})",
                session.is_authenticated()
            );
            Redirect::to(target).into_response()
        }
    }
}

/// Never fails: anything short of a confirmed identity is an anonymous session.
async fn resolve_session(app_state: &AppState, store: &tower_sessions::Session) -> Session {
    let credentials = match store.get::<Credentials>(CREDENTIALS_KEY).await {
        Ok(Some(credentials)) => credentials,
        Ok(None) => return Session::anonymous(),
        Err(e) => {
            warn!("Failed to read credentials from session store: {e:?}");
            return Session::anonymous();
        }
    };

    let resolution = timeout(
        app_state.config.credential_timeout(),
        app_state.auth_provider.resolve(&credentials),
    )
    .await;

    match resolution {
        Ok(Ok(resolution)) => {
            if let Some(refreshed) = resolution.refreshed {
                trace!("Writing refreshed credentials back to the session");
                if let Err(e) = store.insert(CREDENTIALS_KEY, refreshed).await {
                    warn!("Failed to store refreshed credentials: {e:?}");
                }
            }
            resolution.session
        }
        Ok(Err(e)) if e.is_credential_invalid() => {
            info!("Stored credentials were rejected, clearing them");
            if let Err(e) = store.remove::<Credentials>(CREDENTIALS_KEY).await {
                warn!("Failed to clear rejected credentials: {e:?}");
            }
            Session::anonymous()
        }
        Ok(Err(e)) => {
            warn!("Credential resolution failed, treating request as anonymous: {e}");
            Session::anonymous()
        }
        Err(_) => {
            warn!(
                "Credential resolution timed out after {:?}, treating request as anonymous",
                app_state.config.credential_timeout()
            );
            Session::anonymous()
        }
    }
}
