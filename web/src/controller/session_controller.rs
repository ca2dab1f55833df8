use crate::extractors::current_subject::ResolvedSession;
use axum::Json;
use domain::Id;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub is_authenticated: bool,
    pub subject_id: Option<Id>,
}

/// GET /session
///
/// Reports the session the gate resolved for this very request. Lets a
/// frontend decide what to render without a second round trip to the auth
/// provider.
pub async fn show(ResolvedSession(session): ResolvedSession) -> Json<SessionView> {
    Json(SessionView {
        is_authenticated: session.is_authenticated(),
        subject_id: session.subject_id(),
    })
}
