//! Per-request authentication state and the credentials it is derived from.

use crate::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The resolved authentication state for one request. Rebuilt on every request
/// and never cached across requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    subject_id: Option<Id>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { subject_id: None }
    }

    pub fn authenticated(subject_id: Id) -> Self {
        Self {
            subject_id: Some(subject_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject_id.is_some()
    }

    pub fn subject_id(&self) -> Option<Id> {
        self.subject_id
    }
}

/// Token pair issued by the hosted auth provider. Kept server side in the
/// session store; the browser only ever holds the session id cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Outcome of resolving a request's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub session: Session,
    /// Set when the provider rotated the tokens during resolution. The caller
    /// must write these back so the next request presents them.
    pub refreshed: Option<Credentials>,
}

impl Resolution {
    pub fn authenticated(subject_id: Id) -> Self {
        Self {
            session: Session::authenticated(subject_id),
            refreshed: None,
        }
    }

    pub fn refreshed(subject_id: Id, credentials: Credentials) -> Self {
        Self {
            session: Session::authenticated(subject_id),
            refreshed: Some(credentials),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            session: Session::anonymous(),
            refreshed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_has_no_subject() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert_eq!(session.subject_id(), None);
        assert_eq!(session, Session::default());
    }

    #[test]
    fn credentials_debug_output_hides_tokens() {
        let credentials = Credentials::new("access-secret", "refresh-secret");
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[test]
    fn refreshed_resolution_is_authenticated() {
        let subject = Id::new_v4();
        let resolution = Resolution::refreshed(subject, Credentials::new("a", "r"));
        assert_eq!(resolution.session.subject_id(), Some(subject));
        assert!(resolution.refreshed.is_some());
    }
}
