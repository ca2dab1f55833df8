//! Client for the hosted authentication provider (`/auth/v1`).

use async_trait::async_trait;
use log::*;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use service::config::Config;

use super::auth_headers;
use super::http::{HttpClientBuilder, BackoffPolicy};
use crate::credential::{AuthProvider, CredentialResolver};
use crate::error::{CredentialErrorKind, Error};
use crate::session::{Credentials, Resolution};
use crate::Id;

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Id,
}

/// Token grant response body, shared by the password and refresh grants.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: String,
    user: AuthUser,
}

impl TokenGrant {
    fn into_resolution(self) -> Resolution {
        Resolution::refreshed(
            self.user.id,
            Credentials::new(self.access_token, self.refresh_token),
        )
    }
}

#[derive(Serialize)]
struct RefreshGrantRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Result of asking the provider who an access token belongs to.
enum UserLookup {
    Found(Id),
    Rejected,
}

pub struct HostedAuthClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: SecretString,
}

impl HostedAuthClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let api_key = config.anon_key().ok_or_else(|| {
            warn!("Failed to get the hosted backend anon key from config");
            Error::config("anon_key is not configured")
        })?;

        // Keep the whole retry budget inside the gate's credential timeout.
        let client = HttpClientBuilder::new()
            .with_timeout(config.credential_timeout())
            .with_retry_policy(
                BackoffPolicy::new(config.auth_max_retries)
                    .with_max_delay(config.credential_timeout() / 4),
            )
            .build()?;

        Ok(Self::with_client(
            client,
            config.auth_url(),
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

    async fn lookup_user(&self, access_token: &str) -> Result<UserLookup, Error> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(auth_headers(&self.api_key, Some(access_token))?)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: AuthUser = response.json().await?;
                Ok(UserLookup::Found(user.id))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(UserLookup::Rejected),
            status => {
                warn!("Auth provider user lookup failed with status {status}");
                Err(Error::network(&format!("User lookup returned {status}")))
            }
        }
    }

    async fn token_grant<B: Serialize>(&self, grant_type: &str, body: &B) -> Result<Resolution, Error> {
        let url = format!("{}/auth/v1/token?grant_type={grant_type}", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(auth_headers(&self.api_key, None)?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let grant: TokenGrant = response.json().await?;
                Ok(grant.into_resolution())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Auth provider rejected {grant_type} grant");
                Err(Error::credential(
                    CredentialErrorKind::Invalid,
                    &format!("{grant_type} grant rejected"),
                ))
            }
            status => {
                warn!("Auth provider {grant_type} grant failed with status {status}");
                Err(Error::network(&format!("Token grant returned {status}")))
            }
        }
    }

    /// Exchanges a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Resolution, Error> {
        if refresh_token.is_empty() {
            return Err(Error::credential(
                CredentialErrorKind::Invalid,
                "No refresh token available",
            ));
        }
        self.token_grant("refresh_token", &RefreshGrantRequest { refresh_token })
            .await
    }
}

#[async_trait]
impl CredentialResolver for HostedAuthClient {
    async fn resolve(&self, credentials: &Credentials) -> Result<Resolution, Error> {
        if credentials.access_token.is_empty() {
            return Err(Error::credential(
                CredentialErrorKind::Missing,
                "Empty access token",
            ));
        }

        match self.lookup_user(&credentials.access_token).await? {
            UserLookup::Found(subject_id) => Ok(Resolution::authenticated(subject_id)),
            UserLookup::Rejected => {
                debug!("Access token rejected, attempting refresh");
                let resolution = self.refresh(&credentials.refresh_token).await?;
                trace!("Credentials refreshed for {:?}", resolution.session.subject_id());
                Ok(resolution)
            }
        }
    }
}

#[async_trait]
impl AuthProvider for HostedAuthClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Resolution, Error> {
        self.token_grant("password", &PasswordGrantRequest { email, password })
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(auth_headers(&self.api_key, Some(access_token))?)
            .send()
            .await?;

        let status = response.status();
        // An already revoked token still leaves the user signed out.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            warn!("Auth provider sign out failed with status {status}");
            Err(Error::network(&format!("Sign out returned {status}")))
        }
    }
}
