use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Domain(DomainError),
    Web(WebErrorKind),
    Session(tower_sessions::session::Error),
}

/// Failures detected by the web layer itself, before any domain call is made.
#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    Auth,
    Input,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Domain(domain_error) => match domain_error.error_kind {
                DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                    InternalErrorKind::Validation(message) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, message).into_response()
                    }
                    InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                        error!("Internal error: {:?}", domain_error.source);
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                    }
                },
                DomainErrorKind::External(external_error_kind) => match external_error_kind {
                    ExternalErrorKind::Credential(_) => {
                        (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response()
                    }
                    ExternalErrorKind::Network | ExternalErrorKind::Other(_) => {
                        warn!("Upstream error: {:?}", domain_error.source);
                        (StatusCode::BAD_GATEWAY, "BAD GATEWAY").into_response()
                    }
                },
            },
            Error::Web(WebErrorKind::Auth) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response()
            }
            Error::Web(WebErrorKind::Input) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE ENTITY").into_response()
            }
            Error::Session(e) => {
                error!("Session store error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl From<DomainError> for Error {
    fn from(err: DomainError) -> Self {
        Error::Domain(err)
    }
}

impl From<tower_sessions::session::Error> for Error {
    fn from(err: tower_sessions::session::Error) -> Self {
        Error::Session(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::error::CredentialErrorKind;

    #[test]
    fn domain_kinds_map_to_status_codes() {
        let cases = [
            (DomainError::validation("bad row"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::config("missing key"), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::network("down"), StatusCode::BAD_GATEWAY),
            (
                DomainError::credential(CredentialErrorKind::Invalid, "rejected"),
                StatusCode::UNAUTHORIZED,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(Error::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn web_kinds_map_to_status_codes() {
        assert_eq!(
            Error::Web(WebErrorKind::Auth).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::Web(WebErrorKind::Input).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
