//! Login, logout and registration commands.

use miracle_storefront::Storefront;
use miracle_storefront::cart::MergeReport;
use miracle_storefront::session::SessionState;

use super::{CommandError, print_cart, read_secret_line};

pub async fn login(storefront: &Storefront, username: &str) -> Result<(), CommandError> {
    let password = read_secret_line()?;
    let report = storefront.session().login(username, &password).await?;
    greet(storefront).await;
    print_merge(&report);
    Ok(())
}

pub async fn logout(storefront: &Storefront) -> Result<(), CommandError> {
    if !storefront.session().is_authenticated().await {
        println!("Not logged in.");
        return Ok(());
    }
    storefront.session().logout().await;
    println!("Logged out.");
    Ok(())
}

pub async fn register(storefront: &Storefront, name: &str, email: &str) -> Result<(), CommandError> {
    let password = read_secret_line()?;
    let report = storefront.session().register(name, email, &password).await?;
    greet(storefront).await;
    print_merge(&report);
    Ok(())
}

pub async fn send_otp(storefront: &Storefront, email: &str) -> Result<(), CommandError> {
    let response = storefront.session().send_otp(email).await?;
    println!("{}", response.message.as_deref().unwrap_or("Code sent."));
    Ok(())
}

pub async fn verify_otp(storefront: &Storefront, email: &str, otp: &str) -> Result<(), CommandError> {
    let response = storefront.session().verify_otp(email, otp).await?;
    println!("{}", response.message.as_deref().unwrap_or("Code verified."));
    Ok(())
}

pub async fn whoami(storefront: &Storefront) -> Result<(), CommandError> {
    match storefront.session().state().await {
        SessionState::Anonymous => println!("Not logged in."),
        SessionState::Authenticated(user) => {
            println!("{} <{}>", user.display_name(), user.email);
            if storefront.session().is_admin().await {
                println!("Administrator");
            }
        }
    }
    Ok(())
}

async fn greet(storefront: &Storefront) {
    if let Some(user) = storefront.session().current_user().await {
        println!("Welcome, {}!", user.display_name());
    }
}

fn print_merge(report: &MergeReport) {
    if !report.succeeded.is_empty() {
        println!("Moved {} item(s) from your saved cart.", report.succeeded.len());
    }
    for failure in &report.failed {
        println!("Could not move {}: {}", failure.action, failure.reason);
    }
    if let Some(error) = &report.sync_error {
        println!("Cart sync problem: {error}");
    }
    if let Some(cart) = &report.canonical {
        print_cart(cart);
    }
}
