//! Miracle CLI - command-line storefront and back-office.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! miracle products
//! miracle products --category Powders
//!
//! # Work with the cart (kept in $MIRACLE_STATE_DIR between runs)
//! miracle cart add 3 --quantity 2
//! miracle cart show
//!
//! # Log in; the guest cart is merged into the account cart
//! echo "$PASSWORD" | miracle login alice
//!
//! # Back-office (admin account only)
//! miracle admin products create --name "Moringa Tea" --price 9.50 --stock 20
//! ```
//!
//! # Commands
//!
//! - `products`, `product`, `categories`, `recipes`, `videos` - Browse the catalog
//! - `cart` - Show and edit the cart
//! - `login`, `logout`, `register`, `send-otp`, `verify-otp`, `whoami` - Account
//! - `admin` - Category, product, coupon, recipe and user management

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miracle_storefront::Storefront;
use miracle_storefront::config::StorefrontConfig;
use miracle_storefront::storage::FileStore;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CommandError;
use commands::admin::AdminCommand;
use commands::cart::CartCommand;

#[derive(Parser)]
#[command(name = "miracle")]
#[command(author, version, about = "Miracle storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Product {
        /// Product ID
        id: i64,
    },
    /// List categories
    Categories,
    /// List recipes
    Recipes,
    /// List About page videos
    Videos,
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    /// Log in; the password is read from stdin
    Login {
        /// Username or e-mail
        username: String,
    },
    /// Log out, keeping a copy of the account cart locally
    Logout,
    /// Create an account; the password is read from stdin
    Register {
        /// Full name
        #[arg(short, long)]
        name: String,
        /// E-mail address
        #[arg(short, long)]
        email: String,
    },
    /// E-mail a one-time registration code
    SendOtp {
        /// E-mail address
        email: String,
    },
    /// Confirm a one-time registration code
    VerifyOtp {
        /// E-mail address
        email: String,
        /// The code received by e-mail
        otp: String,
    },
    /// Show the logged-in user
    Whoami,
    /// Back-office management
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = StorefrontConfig::from_env().expect("Failed to load configuration");
    let sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "miracle_storefront=info,miracle_cli=info".into());
    let sentry_layer = sentry_guard
        .is_some()
        .then(|| sentry_tracing::layer().event_filter(sentry_event_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    if let Err(e) = run(cli, config).await {
        e.capture();
        eprintln!("Error: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CommandError> {
    let store = FileStore::open(&config.state_dir)?;
    let storefront = Storefront::new(config, Arc::new(store))?;
    storefront.session().init().await;

    let result = match cli.command {
        Commands::Products { category } => {
            commands::browse::products(&storefront, category.as_deref()).await
        }
        Commands::Product { id } => commands::browse::product(&storefront, id).await,
        Commands::Categories => commands::browse::categories(&storefront).await,
        Commands::Recipes => commands::browse::recipes(&storefront).await,
        Commands::Videos => commands::browse::videos(&storefront).await,
        Commands::Cart { action } => commands::cart::run(&storefront, action).await,
        Commands::Login { username } => commands::account::login(&storefront, &username).await,
        Commands::Logout => commands::account::logout(&storefront).await,
        Commands::Register { name, email } => {
            commands::account::register(&storefront, &name, &email).await
        }
        Commands::SendOtp { email } => commands::account::send_otp(&storefront, &email).await,
        Commands::VerifyOtp { email, otp } => {
            commands::account::verify_otp(&storefront, &email, &otp).await
        }
        Commands::Whoami => commands::account::whoami(&storefront).await,
        Commands::Admin { action } => commands::admin::run(&storefront, action).await,
    };

    storefront.session().dispose();
    result
}
