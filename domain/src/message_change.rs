//! Ingestion of row-change webhooks sent by the hosted database.
//!
//! The database calls `POST /webhooks/messages` for every insert or update on
//! the `messages` table. The body is signed with HMAC-SHA256 over the raw bytes
//! using the shared webhook secret, hex encoded in `x-webhook-signature`
//! (optionally prefixed with `sha256=`). Verified changes are turned into
//! domain events and handed to the publisher, which routes them to the
//! affected subjects' push channels.

use crate::error::{CredentialErrorKind, Error};
use events::{DomainEvent, EventPublisher, MessageRow};
use hmac::{Hmac, Mac};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const MESSAGES_TABLE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowChangeType {
    Insert,
    Update,
    Delete,
}

/// Database webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct RowChangePayload {
    #[serde(rename = "type")]
    pub change_type: RowChangeType,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Published,
    Ignored,
}

/// Verifies webhook signatures against the shared secret.
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    pub fn verify(&self, signature: Option<&str>, body: &[u8]) -> Result<(), Error> {
        let signature = signature.ok_or_else(|| {
            Error::credential(
                CredentialErrorKind::Missing,
                &format!("Missing signature header: {SIGNATURE_HEADER}"),
            )
        })?;

        let expected = hex::decode(signature.trim().trim_start_matches("sha256=")).map_err(|_| {
            Error::credential(CredentialErrorKind::Invalid, "Invalid signature format")
        })?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::config("Invalid webhook secret"))?;
        mac.update(body);

        mac.verify_slice(&expected)
            .map_err(|_| Error::credential(CredentialErrorKind::Invalid, "Signature mismatch"))
    }

    /// Hex signature for `body`; the form the database webhook sends.
    pub fn sign(&self, body: &[u8]) -> Result<String, Error> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::config("Invalid webhook secret"))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Translates a row change into the domain event it represents, if any.
pub fn to_domain_event(payload: &RowChangePayload) -> Result<Option<DomainEvent>, Error> {
    if payload.table != MESSAGES_TABLE {
        debug!("Ignoring change on table {}", payload.table);
        return Ok(None);
    }

    let record = || -> Result<MessageRow, Error> {
        let record = payload
            .record
            .clone()
            .ok_or_else(|| Error::validation("Row change has no record"))?;
        Ok(serde_json::from_value(record)?)
    };

    let event = match payload.change_type {
        RowChangeType::Insert => {
            let message = record()?;
            DomainEvent::MessageInserted {
                notify_user_ids: notify_user_ids(&message),
                message,
            }
        }
        RowChangeType::Update => {
            let message = record()?;
            DomainEvent::MessageUpdated {
                notify_user_ids: notify_user_ids(&message),
                message,
            }
        }
        RowChangeType::Delete => return Ok(None),
    };

    Ok(Some(event))
}

/// Publishes the change carried by `payload`.
pub async fn ingest(
    publisher: &EventPublisher,
    payload: &RowChangePayload,
) -> Result<IngestOutcome, Error> {
    match to_domain_event(payload)? {
        Some(event) => {
            debug!(
                "Publishing {:?} for message {}",
                event.change().kind(),
                event.change().row().id
            );
            publisher.publish(event).await;
            Ok(IngestOutcome::Published)
        }
        None => Ok(IngestOutcome::Ignored),
    }
}

fn notify_user_ids(message: &MessageRow) -> Vec<crate::Id> {
    if message.sender_id == message.receiver_id {
        vec![message.receiver_id]
    } else {
        vec![message.receiver_id, message.sender_id]
    }
}
