//! REST client for the Miracle backend.
//!
//! One `reqwest::Client` per [`ApiClient`], shared cheaply through an `Arc`.
//! The client keeps a cookie jar for its whole lifetime: the backend's
//! anonymous session cart is keyed by the session cookie it sets, so the
//! same `ApiClient` must be reused for every session-cart request.
//!
//! Bearer credentials are passed per request through [`Auth`]. The auth
//! endpoints in [`PUBLIC_ENDPOINTS`] never carry a bearer header, even if
//! one is supplied.

pub mod types;

use std::sync::Arc;

use reqwest::Method;
use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ApiConfig;

/// Endpoints that are called without a bearer token.
pub const PUBLIC_ENDPOINTS: &[&str] = &[
    "/login/",
    "/register/",
    "/token/refresh/",
    "/logout/",
    "/send-otp/",
    "/verify-otp/",
];

/// Longest slice of an error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or unreadable body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status other than 401 and 404.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// The backend rejected the bearer token (or credentials).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the backend answered 401.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) | Self::InvalidUrl(_) => None,
        }
    }
}

/// Credentials attached to a single request.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// No `Authorization` header; session cookie only.
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(&'a SecretString),
}

// =============================================================================
// ApiClient
// =============================================================================

/// HTTP client for the backend REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with a cookie jar and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;

        // A trailing slash makes `Url::join` append instead of replacing the
        // last path segment.
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner { client, base_url }),
        })
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve an endpoint path such as `/cart/3/` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Make a possibly relative media path absolute against the base URL.
    #[must_use]
    pub fn absolute_url(&self, raw: Option<&str>) -> Option<String> {
        absolute_url(&self.inner.base_url, raw)
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    /// `GET` an endpoint and decode its JSON body.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-2xx status or a body that
    /// does not decode as `T`.
    #[instrument(skip(self, auth), fields(path = %path))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Auth<'_>,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path, auth)?;
        let body = self.execute(request, path).await?;
        decode(&body)
    }

    /// Send a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-2xx status or a body that
    /// does not decode as `T`.
    #[instrument(skip(self, body, auth), fields(method = %method, path = %path))]
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(method, path, auth)?.json(body);
        let text = self.execute(request, path).await?;
        decode(&text)
    }

    /// Send a JSON body, ignoring whatever the backend answers on success.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    #[instrument(skip(self, body, auth), fields(method = %method, path = %path))]
    pub async fn send_unit<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(method, path, auth)?.json(body);
        self.execute(request, path).await?;
        Ok(())
    }

    /// `DELETE` an endpoint.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or non-2xx status.
    #[instrument(skip(self, auth), fields(path = %path))]
    pub async fn delete(&self, path: &str, auth: Auth<'_>) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path, auth)?;
        self.execute(request, path).await?;
        Ok(())
    }

    /// Send a multipart form and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-2xx status or a body that
    /// does not decode as `T`.
    #[instrument(skip(self, form, auth), fields(method = %method, path = %path))]
    pub async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Form,
        auth: Auth<'_>,
    ) -> Result<T, ApiError> {
        let request = self.request(method, path, auth)?.multipart(form);
        let text = self.execute(request, path).await?;
        decode(&text)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        auth: Auth<'_>,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        let builder = self.inner.client.request(method, url);

        Ok(match auth {
            Auth::Bearer(token) if !is_public_endpoint(path) => {
                builder.bearer_auth(token.expose_secret())
            }
            _ => builder,
        })
    }

    /// Send a request and map the status onto [`ApiError`].
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(status = %status, "Backend responded");

        if status.is_success() {
            return Ok(text);
        }

        let message = text.chars().take(MAX_ERROR_BODY).collect::<String>();
        Err(match status {
            reqwest::StatusCode::UNAUTHORIZED => ApiError::Unauthorized(path.to_string()),
            reqwest::StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
            _ => {
                tracing::warn!(status = %status, body = %message, "Backend returned non-success status");
                ApiError::Status {
                    status: status.as_u16(),
                    message,
                }
            }
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Whether a path is one of the unauthenticated auth endpoints.
#[must_use]
pub fn is_public_endpoint(path: &str) -> bool {
    let normalized = format!("/{}", path.trim_start_matches('/'));
    PUBLIC_ENDPOINTS.contains(&normalized.as_str())
}

/// Make a media path absolute.
///
/// `http(s)://` URLs pass through unchanged; anything else is joined onto
/// the base URL with exactly one slash. Empty input yields `None`.
#[must_use]
pub fn absolute_url(base: &Url, raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }

    let base = base.as_str().trim_end_matches('/');
    Some(format!("{base}/{}", raw.trim_start_matches('/')))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ApiConfig::new(base).unwrap()).unwrap()
    }

    #[test]
    fn test_public_endpoints() {
        assert!(is_public_endpoint("/login/"));
        assert!(is_public_endpoint("token/refresh/"));
        assert!(!is_public_endpoint("/cart/"));
        assert!(!is_public_endpoint("/user/"));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("http://localhost:8000/api");
        assert_eq!(
            api.endpoint("/cart/12/").unwrap().as_str(),
            "http://localhost:8000/api/cart/12/"
        );
    }

    #[test]
    fn test_absolute_url() {
        let base = Url::parse("http://localhost:8000/").unwrap();
        assert_eq!(
            absolute_url(&base, Some("/media/a.png")).as_deref(),
            Some("http://localhost:8000/media/a.png")
        );
        assert_eq!(
            absolute_url(&base, Some("media/a.png")).as_deref(),
            Some("http://localhost:8000/media/a.png")
        );
        assert_eq!(
            absolute_url(&base, Some("https://cdn.test/a.png")).as_deref(),
            Some("https://cdn.test/a.png")
        );
        assert_eq!(absolute_url(&base, Some("  ")), None);
        assert_eq!(absolute_url(&base, None), None);
    }

    #[test]
    fn test_error_status() {
        assert_eq!(ApiError::Unauthorized("/user/".into()).status(), Some(401));
        assert!(ApiError::Unauthorized("/user/".into()).is_unauthorized());
        assert_eq!(
            ApiError::Status {
                status: 500,
                message: String::new()
            }
            .status(),
            Some(500)
        );
    }
}
