//! Capabilities the session gate and the login endpoints depend on. The hosted
//! implementation lives in `gateway::hosted_auth`; tests substitute fakes.

use crate::error::Error;
use crate::session::{Credentials, Resolution};
use async_trait::async_trait;

/// Turns a request's stored credentials into a session.
///
/// May perform network I/O and may rotate the credentials, in which case the
/// new pair is returned in `Resolution::refreshed`. Called at most once per
/// request; retrying transient failures is up to the implementation.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, credentials: &Credentials) -> Result<Resolution, Error>;
}

/// The hosted auth provider as seen by this application.
#[async_trait]
pub trait AuthProvider: CredentialResolver {
    /// Exchanges an email and password for a fresh token pair. Returns the
    /// signed-in subject together with the credentials to store.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Resolution, Error>;

    /// Revokes the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), Error>;
}
