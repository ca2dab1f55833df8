//! Error types for the live counter.
use std::error::Error as StdError;
use std::fmt;

/// None of these ever reach the user: the counter logs them and keeps showing
/// its last known value.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The authoritative count could not be fetched.
    FetchFailed,
    /// The push channel refused or failed to open a subscription.
    SubscriptionFailed,
    /// An open subscription ended. It is not reopened.
    SubscriptionDropped,
}

impl Error {
    pub fn fetch_failed(message: &str) -> Self {
        Self::with_kind(ErrorKind::FetchFailed, message)
    }

    pub fn subscription_failed(message: &str) -> Self {
        Self::with_kind(ErrorKind::SubscriptionFailed, message)
    }

    pub fn subscription_dropped() -> Self {
        Self {
            source: None,
            error_kind: ErrorKind::SubscriptionDropped,
        }
    }

    fn with_kind(error_kind: ErrorKind, message: &str) -> Self {
        Self {
            source: Some(message.to_string().into()),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{:?}: {source}", self.error_kind),
            None => write!(f, "{:?}", self.error_kind),
        }
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
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::FetchFailed,
        }
    }
}

impl From<eventsource_client::Error> for Error {
    fn from(err: eventsource_client::Error) -> Self {
        Error::subscription_failed(&err.to_string())
    }
}
