//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree with `domain::error::Error`
/// as the root, holding an `error_kind` that says where the failure came from and
/// an optional `source` with the original error. `web` turns the kinds into HTTP
/// status codes; the session gate only ever asks whether a failure means the
/// credential itself is bad.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Failures that originate in this process: bad configuration or bad input.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Validation(String),
    Other(String),
}

/// Failures reported by, or while talking to, the hosted backend.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    Credential(CredentialErrorKind),
    Other(String),
}

/// Why a credential could not be turned into an identity.
#[derive(Debug, PartialEq)]
pub enum CredentialErrorKind {
    Missing,
    Invalid,
}

impl Error {
    pub fn config(message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn validation(message: &str) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(
                message.to_string(),
            )),
        }
    }

    pub fn credential(kind: CredentialErrorKind, message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Credential(kind)),
        }
    }

    pub fn network(message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
        }
    }

    /// True when the hosted provider rejected the credential outright, as opposed
    /// to a transient failure that might succeed on a later request.
    pub fn is_credential_invalid(&self) -> bool {
        self.error_kind
            == DomainErrorKind::External(ExternalErrorKind::Credential(
                CredentialErrorKind::Invalid,
            ))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => Error {
                source: Some(err.into()),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(
                "Malformed JSON payload".to_string(),
            )),
        }
    }
}
