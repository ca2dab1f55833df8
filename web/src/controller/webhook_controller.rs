//! Controller for the hosted database webhook.
//!
//! The database calls this endpoint for every row change on `messages`. The
//! body is signed with HMAC-SHA256 using the shared webhook secret; verified
//! changes are published as domain events and fanned out over SSE.

use crate::{AppState, Error};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use domain::error::Error as DomainError;
use domain::message_change::{
    self as MessageChangeApi, IngestOutcome, RowChangePayload, SignatureVerifier, SIGNATURE_HEADER,
};
use log::*;
use secrecy::SecretString;
use serde::Serialize;

/// Response for webhook acknowledgment
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
}

/// POST /webhooks/messages
pub async fn message_change(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, Error> {
    let secret = app_state.config.webhook_secret().ok_or_else(|| {
        error!("Webhook secret is not configured, rejecting database webhook");
        DomainError::config("Webhook secret is not configured")
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = SignatureVerifier::new(SecretString::new(secret)).verify(signature, &body) {
        warn!("Rejected database webhook: {e}");
        return Err(e.into());
    }

    let payload: RowChangePayload = serde_json::from_slice(&body).map_err(|e| {
        warn!("Malformed database webhook body: {e}");
        DomainError::validation("Malformed row change payload")
    })?;

    let status = match MessageChangeApi::ingest(&app_state.event_publisher, &payload).await? {
        IngestOutcome::Published => "published",
        IngestOutcome::Ignored => "ignored",
    };

    debug!(
        "Database webhook {:?} on {} {status}",
        payload.change_type, payload.table
    );

    Ok(Json(WebhookResponse {
        status: status.to_string(),
    }))
}
