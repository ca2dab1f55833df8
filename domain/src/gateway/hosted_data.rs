//! Client for the hosted REST data store (`/rest/v1`).

use async_trait::async_trait;
use log::*;
use reqwest::header::CONTENT_RANGE;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::{ExposeSecret, SecretString};
use service::config::Config;

use super::auth_headers;
use super::http::HttpClientBuilder;
use crate::error::Error;
use crate::message::UnreadCountStore;
use crate::Id;

const MESSAGES_PATH: &str = "/rest/v1/messages";

pub struct HostedDataClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: SecretString,
}

impl HostedDataClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let api_key = config.data_api_key().ok_or_else(|| {
            warn!("Failed to get the hosted data store API key from config");
            Error::config("data_api_key is not configured")
        })?;

        Ok(Self::with_client(
            HttpClientBuilder::new().build()?,
            config.data_url(),
            SecretString::new(api_key),
        ))
    }

    pub fn with_client(client: ClientWithMiddleware, base_url: &str, api_key: SecretString) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl UnreadCountStore for HostedDataClient {
    async fn count_unread(&self, subject_id: Id) -> Result<u64, Error> {
        let url = format!(
            "{}{MESSAGES_PATH}?select=id&receiver_id=eq.{subject_id}&read=eq.false",
            self.base_url
        );

        // The server-side key acts as its own bearer; rows are filtered by receiver above.
        let response = self
            .client
            .head(&url)
            .headers(auth_headers(&self.api_key, Some(self.api_key.expose_secret()))?)
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Unread count query failed with status {status}");
            return Err(Error::network(&format!("Unread count query returned {status}")));
        }

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::network("Unread count response has no Content-Range"))?;

        parse_total(content_range)
    }
}

/// Extracts the total from a `Content-Range` value such as `0-4/5` or `*/0`.
fn parse_total(content_range: &str) -> Result<u64, Error> {
    content_range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            warn!("Unparseable Content-Range: {content_range}");
            Error::network(&format!("Unparseable Content-Range: {content_range}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::http::BackoffPolicy;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> HostedDataClient {
        let client = HttpClientBuilder::new()
            .with_retry_policy(BackoffPolicy::new(0))
            .build()
            .unwrap();
        HostedDataClient::with_client(client, &server.url(), SecretString::new("service".to_string()))
    }

    #[test]
    fn parses_totals_from_content_range() {
        assert_eq!(parse_total("0-4/5").unwrap(), 5);
        assert_eq!(parse_total("*/0").unwrap(), 0);
        assert!(parse_total("0-4/*").is_err());
        assert!(parse_total("garbage").is_err());
    }

    #[tokio::test]
    async fn counts_unread_messages_for_receiver() {
        let mut server = Server::new_async().await;
        let subject = Id::new_v4();
        let query = server
            .mock("HEAD", MESSAGES_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("receiver_id".into(), format!("eq.{subject}")),
                Matcher::UrlEncoded("read".into(), "eq.false".into()),
            ]))
            .match_header("prefer", "count=exact")
            .match_header("apikey", "service")
            .with_status(200)
            .with_header("content-range", "0-2/3")
            .create_async()
            .await;

        let count = client_for(&server).count_unread(subject).await.unwrap();

        query.assert_async().await;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn failed_query_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("HEAD", MESSAGES_PATH)
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        assert!(client_for(&server).count_unread(Id::new_v4()).await.is_err());
    }
}
