//! Sign-in and sign-out against the hosted auth provider.

use crate::credential::AuthProvider;
use crate::error::Error;
use crate::session::{Credentials, Resolution};
use email_address::EmailAddress;
use log::*;
use serde::Deserialize;

/// Login form body.
#[derive(Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EmailAddress::is_valid(email)
}

/// Signs in with email and password. The returned resolution always carries
/// the credentials to store in the session.
pub async fn sign_in(provider: &dyn AuthProvider, form: &LoginForm) -> Result<Resolution, Error> {
    let email = form.email.trim();
    if !is_valid_email(email) {
        warn!("Rejected login with malformed email");
        return Err(Error::validation("Invalid email address"));
    }
    if form.password.is_empty() {
        return Err(Error::validation("Password is required"));
    }

    let resolution = provider.sign_in_with_password(email, &form.password).await?;
    if resolution.refreshed.is_none() {
        return Err(Error::network("Sign in returned no credentials"));
    }

    info!("Signed in subject {:?}", resolution.session.subject_id());
    Ok(resolution)
}

/// Revokes the provider session behind `credentials`. Failures are logged only;
/// the local session is cleared by the caller either way.
pub async fn sign_out(provider: &dyn AuthProvider, credentials: &Credentials) {
    if let Err(e) = provider.sign_out(&credentials.access_token).await {
        warn!("Provider sign out failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialResolver;
    use crate::Id;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        subject: Id,
    }

    #[async_trait]
    impl CredentialResolver for CountingProvider {
        async fn resolve(&self, _credentials: &Credentials) -> Result<Resolution, Error> {
            Ok(Resolution::authenticated(self.subject))
        }
    }

    #[async_trait]
    impl AuthProvider for CountingProvider {
        async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Resolution, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Resolution::refreshed(self.subject, Credentials::new("a", "r")))
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), Error> {
            Err(Error::network("offline"))
        }
    }

    fn provider() -> CountingProvider {
        CountingProvider {
            calls: AtomicUsize::new(0),
            subject: Id::new_v4(),
        }
    }

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn malformed_email_never_reaches_provider() {
        let provider = provider();
        assert!(sign_in(&provider, &form("not-an-email", "pw")).await.is_err());
        assert!(sign_in(&provider, &form("ada@example.com", "")).await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_form_signs_in() {
        let provider = provider();
        let resolution = sign_in(&provider, &form(" ada@example.com ", "pw")).await.unwrap();
        assert_eq!(resolution.session.subject_id(), Some(provider.subject));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sign_out_swallows_provider_errors() {
        sign_out(&provider(), &Credentials::new("a", "r")).await;
    }

    #[test]
    fn login_form_debug_hides_password() {
        assert!(!format!("{:?}", form("ada@example.com", "hunter2")).contains("hunter2"));
    }
}
