//! Remote secret-manager backend over HTTP
//!
//! Issues `GET <base_url>/secrets/<id>` with an optional bearer token and
//! expects a JSON object of string entries in the response body. The id is
//! always a single percent-encoded path segment.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::backend::SecretBackend;
use crate::error::{Result, SecretError};
use crate::value::SecretValue;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend backed by a remote secret-manager API.
pub struct HttpBackend {
    id: String,
    base_url: Url,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let base_url = Url::parse(&base_url.into())
            .map_err(|e| SecretError::unavailable(&id, format!("invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SecretError::unavailable(&id, "base URL cannot carry a path"));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SecretError::unavailable(&id, e))?;
        Ok(Self {
            id,
            base_url,
            token: None,
            client,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Read the bearer token from an environment variable, if set.
    pub fn with_token_env(self, var: &str) -> Self {
        match std::env::var(var) {
            Ok(token) if !token.is_empty() => self.with_token(token),
            _ => self,
        }
    }

    /// Request URL for `secret_id`.
    ///
    /// Separators and dot segments in the id cannot address anything outside
    /// `<base_url>/secrets/`.
    pub fn secret_url(&self, secret_id: &str) -> Result<Url> {
        if matches!(secret_id, "" | "." | "..") {
            return Err(SecretError::not_found(&self.id, secret_id));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SecretError::unavailable(&self.id, "base URL cannot carry a path"))?
            .pop_if_empty()
            .push("secrets")
            .push(secret_id);
        Ok(url)
    }
}

/// Map a non-success HTTP status to a secret error.
pub fn classify_status(provider: &str, secret_id: &str, status: u16) -> Option<SecretError> {
    match status {
        200..=299 => None,
        404 => Some(SecretError::not_found(provider, secret_id)),
        401 | 403 => Some(SecretError::access_denied(
            provider,
            secret_id,
            format!("HTTP {}", status),
        )),
        other => Some(SecretError::unavailable(provider, format!("HTTP {}", other))),
    }
}

impl SecretBackend for HttpBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, secret_id: &str) -> Result<SecretValue> {
        let url = self.secret_url(secret_id)?;
        debug!(provider = %self.id, %url, "Fetching remote secret");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| SecretError::unavailable(&self.id, e))?;

        if let Some(err) = classify_status(&self.id, secret_id, response.status().as_u16()) {
            return Err(err);
        }

        let entries: BTreeMap<String, String> = response
            .json()
            .map_err(|e| SecretError::unavailable(&self.id, format!("invalid body: {}", e)))?;
        Ok(SecretValue::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status("vault", "db", 200).is_none());
        assert!(matches!(
            classify_status("vault", "db", 404),
            Some(SecretError::NotFound { .. })
        ));
        assert!(matches!(
            classify_status("vault", "db", 403),
            Some(SecretError::AccessDenied { .. })
        ));
        assert!(matches!(
            classify_status("vault", "db", 401),
            Some(SecretError::AccessDenied { .. })
        ));
        assert!(matches!(
            classify_status("vault", "db", 503),
            Some(SecretError::ProviderUnavailable { .. })
        ));
    }

    #[test]
    fn test_secret_url_trims_trailing_slash() {
        let backend = HttpBackend::new("vault", "https://secrets.internal/v1/").unwrap();
        assert_eq!(
            backend.secret_url("db").unwrap().as_str(),
            "https://secrets.internal/v1/secrets/db"
        );

        let bare = HttpBackend::new("vault", "https://secrets.internal").unwrap();
        assert_eq!(
            bare.secret_url("db").unwrap().as_str(),
            "https://secrets.internal/secrets/db"
        );
    }

    #[test]
    fn test_secret_id_stays_one_segment() {
        let backend = HttpBackend::new("vault", "https://secrets.internal/v1").unwrap();

        let url = backend.secret_url("../../admin/keys").unwrap();
        assert_eq!(
            url.as_str(),
            "https://secrets.internal/v1/secrets/..%2F..%2Fadmin%2Fkeys"
        );

        let url = backend.secret_url("db?version=1#frag").unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().unwrap().last(), Some("db%3Fversion=1%23frag"));

        for id in ["", ".", ".."] {
            assert!(matches!(
                backend.secret_url(id),
                Err(SecretError::NotFound { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpBackend::new("vault", "not a url"),
            Err(SecretError::ProviderUnavailable { .. })
        ));
        assert!(matches!(
            HttpBackend::new("vault", "mailto:ops@example.com"),
            Err(SecretError::ProviderUnavailable { .. })
        ));
    }

    #[test]
    fn test_unreachable_host_is_unavailable() {
        let backend = HttpBackend::new("vault", "http://127.0.0.1:1").unwrap();
        assert!(matches!(
            backend.fetch("db"),
            Err(SecretError::ProviderUnavailable { .. })
        ));
    }
}
