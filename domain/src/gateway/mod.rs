//! Clients for the hosted backend-as-a-service.

pub mod hosted_auth;
pub mod hosted_data;
pub mod http;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CredentialErrorKind, Error};

/// Header carrying the project API key on every hosted backend call.
pub(crate) const API_KEY_HEADER: &str = "apikey";

/// Builds the `apikey` header, plus `Authorization: Bearer` when acting for a user.
pub(crate) fn auth_headers(
    api_key: &SecretString,
    bearer: Option<&str>,
) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();

    let mut key = HeaderValue::from_str(api_key.expose_secret())
        .map_err(|_| Error::config("API key is not a valid header value"))?;
    key.set_sensitive(true);
    headers.insert(API_KEY_HEADER, key);

    if let Some(bearer) = bearer {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|_| {
                Error::credential(
                    CredentialErrorKind::Invalid,
                    "Bearer token is not a valid header value",
                )
            })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_bearer_token_is_an_invalid_credential() {
        let api_key = SecretString::new("anon".to_string());

        let err = auth_headers(&api_key, Some("token\nwith-newline")).unwrap_err();

        assert!(err.is_credential_invalid());
    }

    #[test]
    fn bearer_token_becomes_an_authorization_header() {
        let api_key = SecretString::new("anon".to_string());

        let headers = auth_headers(&api_key, Some("token")).unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer token");
        assert_eq!(headers[API_KEY_HEADER], "anon");
    }
}
