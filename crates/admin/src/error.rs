//! Error type for back-office operations.

use miracle_storefront::api::ApiError;
use miracle_storefront::session::SessionError;
use thiserror::Error;

/// Errors from the admin client.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The request failed, or the session could not be refreshed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The current user is not an administrator.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input rejected before it was sent.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An upload could not be read.
    #[error("Upload error: {0}")]
    Upload(#[from] std::io::Error),
}

impl From<ApiError> for AdminError {
    fn from(err: ApiError) -> Self {
        Self::Session(SessionError::Api(err))
    }
}
