use crate::error::Result as WebResult;
use crate::middleware::session_gate::CREDENTIALS_KEY;
use crate::AppState;
use axum::extract::State;
use axum::response::Redirect;
use axum::Form;
use domain::error::{DomainErrorKind, InternalErrorKind};
use domain::route_policy::{FEED_PATH, LOGIN_PATH};
use domain::session::Credentials;
use domain::user_session::{self as UserSessionApi, LoginForm};
use log::*;

pub(crate) const LOGIN_FAILED_PATH: &str = "/login?error=invalid_credentials";

/// POST /login
///
/// Signs in with the hosted auth provider and stores the issued token pair in
/// the server-side session. The browser only ever sees the session id cookie:
///
/// curl -v --data "email=ada@example.com&password=secret" http://localhost:4000/login
///
/// The session id is cycled on success so a pre-login id can't be reused.
pub async fn login(
    State(app_state): State<AppState>,
    session: tower_sessions::Session,
    Form(form): Form<LoginForm>,
) -> WebResult<Redirect> {
    let resolution = match UserSessionApi::sign_in(app_state.auth_provider.as_ref(), &form).await {
        Ok(resolution) => resolution,
        Err(e) if e.is_credential_invalid() || is_validation(&e.error_kind) => {
            warn!("Login rejected for {:?}", form.email);
            return Ok(Redirect::to(LOGIN_FAILED_PATH));
        }
        Err(e) => {
            error!("Login failed: {e}");
            return Err(e.into());
        }
    };

    let Some(credentials) = resolution.refreshed else {
        return Ok(Redirect::to(LOGIN_FAILED_PATH));
    };

    session.cycle_id().await?;
    session.insert(CREDENTIALS_KEY, credentials).await?;

    Ok(Redirect::to(FEED_PATH))
}

/// POST /logout
///
/// Revokes the provider session when there is one, then drops the local
/// session whatever the provider said.
pub async fn logout(
    State(app_state): State<AppState>,
    session: tower_sessions::Session,
) -> WebResult<Redirect> {
    trace!("UserSessionController::logout()");

    if let Some(credentials) = session.get::<Credentials>(CREDENTIALS_KEY).await? {
        UserSessionApi::sign_out(app_state.auth_provider.as_ref(), &credentials).await;
    }
    session.flush().await?;

    Ok(Redirect::to(LOGIN_PATH))
}

fn is_validation(kind: &DomainErrorKind) -> bool {
    matches!(
        kind,
        DomainErrorKind::Internal(InternalErrorKind::Validation(_))
    )
}
