//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};

/// `POST /login/` body.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `POST /register/` body.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /send-otp/` body.
#[derive(Debug, Serialize)]
pub struct SendOtpRequest<'a> {
    pub email: &'a str,
}

/// `POST /verify-otp/` body.
#[derive(Debug, Serialize)]
pub struct VerifyOtpRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

/// `POST /token/refresh/` and `POST /logout/` body.
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Token pair returned by login, registration and refresh.
///
/// Refresh responses omit `refresh` unless the backend rotates it.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .field("message", &self.message)
            .finish()
    }
}

/// Free-form acknowledgement returned by the OTP endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /cart/` body.
#[derive(Debug, Serialize)]
pub struct AddToCartRequest {
    pub product: i64,
    pub quantity: u32,
}

/// `PUT /cart/{key}/` body. Session carts also need the product id.
#[derive(Debug, Serialize)]
pub struct UpdateCartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<i64>,
    pub quantity: u32,
}
