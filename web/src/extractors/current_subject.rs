use crate::extractors::RejectionType;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use domain::session::Session;
use domain::Id;

/// The authenticated subject of the current request.
///
/// Reads the `Session` the session gate placed in the request extensions, so it
/// never calls the auth provider a second time. Rejects with 401 when the
/// request is anonymous, which only happens on routes the policy leaves public.
pub(crate) struct CurrentSubject(pub Id);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSubject
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Session>().and_then(Session::subject_id) {
            Some(subject_id) => Ok(CurrentSubject(subject_id)),
            None => Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string())),
        }
    }
}

/// The resolved session, anonymous or not. Never rejects.
pub(crate) struct ResolvedSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for ResolvedSession
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ResolvedSession(
            parts.extensions.get::<Session>().copied().unwrap_or_default(),
        ))
    }
}
