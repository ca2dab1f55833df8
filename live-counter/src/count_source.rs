//! The authoritative unread count, fetched on mount and after every update.

use crate::error::Error;
use async_trait::async_trait;
use events::Id;
use log::*;
use reqwest::Client;
use serde::Deserialize;

pub const UNREAD_COUNT_PATH: &str = "/api/messages/unread_count";

/// Idempotent and safe to call repeatedly.
#[async_trait]
pub trait CountSource: Send + Sync {
    async fn fetch_unread_count(&self, subject_id: Id) -> Result<u64, Error>;
}

#[derive(Debug, Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

/// Fetches the count from the BFF. The client must carry the session cookie;
/// the server derives the subject from the session, not from the request.
pub struct HttpCountSource {
    client: Client,
    base_url: String,
}

impl HttpCountSource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CountSource for HttpCountSource {
    async fn fetch_unread_count(&self, subject_id: Id) -> Result<u64, Error> {
        let url = format!("{}{UNREAD_COUNT_PATH}", self.base_url);
        trace!("Fetching unread count for subject {subject_id} from {url}");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::fetch_failed(&format!(
                "unread count request returned {}",
                response.status()
            )));
        }

        let body: UnreadCountResponse = response.json().await?;
        Ok(body.count)
    }
}
