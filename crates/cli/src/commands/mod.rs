//! Command implementations.

pub mod account;
pub mod admin;
pub mod browse;
pub mod cart;

use miracle_admin::AdminError;
use miracle_core::CartSnapshot;
use miracle_storefront::api::ApiError;
use miracle_storefront::cart::CartError;
use miracle_storefront::error::AppError;
use miracle_storefront::session::SessionError;
use miracle_storefront::storage::StoreError;
use thiserror::Error;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    /// Reading the password from stdin failed.
    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

impl CommandError {
    /// Report unexpected failures to Sentry.
    pub fn capture(&self) {
        match self {
            Self::App(e) => e.capture(),
            Self::Admin(AdminError::Session(SessionError::Api(e)))
                if !matches!(e.status(), Some(400..=499)) =>
            {
                let event_id = sentry::capture_error(self);
                tracing::error!(error = %self, sentry_event_id = %event_id, "Admin operation failed");
            }
            _ => {}
        }
    }
}

impl From<ApiError> for CommandError {
    fn from(err: ApiError) -> Self {
        Self::App(err.into())
    }
}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        Self::App(err.into())
    }
}

impl From<CartError> for CommandError {
    fn from(err: CartError) -> Self {
        Self::App(err.into())
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        Self::App(err.into())
    }
}

/// Print cart lines and totals.
pub fn print_cart(cart: &CartSnapshot) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for item in cart {
        println!(
            "[{}] {} (#{}) x{} @ {} = {}",
            item.id,
            item.product.name,
            item.product.id,
            item.quantity,
            item.product.price,
            item.line_total()
        );
    }
    println!("Items:    {}", cart.total_items());
    println!("Subtotal: {}", cart.subtotal());
    println!("Tax:      {}", cart.tax());
    println!("Total:    {}", cart.total());
}

/// Read one line from stdin, trimming the newline.
pub fn read_secret_line() -> Result<secrecy::SecretString, CommandError> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        return Err(CommandError::Invalid("password must not be empty".to_string()));
    }
    Ok(secret.into())
}
