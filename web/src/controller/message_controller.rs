use crate::extractors::current_subject::CurrentSubject;
use crate::{AppState, Error};
use axum::extract::State;
use axum::Json;
use domain::message::{self as MessageApi, UnreadCount};
use log::*;

/// GET /api/messages/unread_count
///
/// The authoritative unread count for the current subject, as read from the
/// hosted data store. Live counters call this on mount and after every
/// `updated` change event.
pub async fn unread_count(
    CurrentSubject(subject_id): CurrentSubject,
    State(app_state): State<AppState>,
) -> Result<Json<UnreadCount>, Error> {
    debug!("GET unread count for subject {subject_id}");

    let unread = MessageApi::unread_count(app_state.unread_store.as_ref(), subject_id).await?;

    Ok(Json(unread))
}
