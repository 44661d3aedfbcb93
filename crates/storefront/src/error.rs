//! Unified error handling with Sentry integration.
//!
//! Every module returns its own error enum; [`AppError`] aggregates them for
//! callers (the CLI) that only need to report what went wrong.

use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::config::ConfigError;
use crate::session::SessionError;
use crate::storage::StoreError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local state could not be read or written.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Login, registration or token refresh failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl AppError {
    /// Report unexpected errors to Sentry.
    ///
    /// Rejections the user can act on (bad credentials, expired session,
    /// invalid input) are not reported.
    pub fn capture(&self) {
        let expected = matches!(
            self,
            Self::Session(
                SessionError::NotAuthenticated
                    | SessionError::SessionExpired
                    | SessionError::InvalidEmail(_)
            ) | Self::Cart(CartError::InvalidQuantity(_) | CartError::LineNotFound(_))
                | Self::Config(_)
        ) || self.api_error().is_some_and(|e| {
            matches!(e.status(), Some(400..=499))
        });

        if !expected {
            let event_id = sentry::capture_error(self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Operation failed");
        }
    }

    fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e)
            | Self::Session(SessionError::Api(e))
            | Self::Cart(CartError::Session(SessionError::Api(e))) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use miracle_core::CartItemId;

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::from(ApiError::NotFound("/products/9/".to_string()));
        assert_eq!(err.to_string(), "Not found: /products/9/");

        let err = AppError::from(CartError::LineNotFound(CartItemId::new(4)));
        assert_eq!(err.to_string(), "Cart line not found: 4");
    }

    #[test]
    fn test_api_error_unwrapped_through_layers() {
        let err = AppError::from(CartError::Session(SessionError::Api(ApiError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        })));
        assert_eq!(err.api_error().and_then(ApiError::status), Some(502));
    }

    #[test]
    fn test_sentry_helpers_without_client() {
        // No Sentry client is bound in tests; the helpers must be no-ops.
        set_sentry_user(&"42", Some("asha@example.com"));
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "7")]));
        clear_sentry_user();
    }
}
