//! Cart commands.

use clap::Subcommand;
use miracle_core::{CartItemId, ProductId};
use miracle_storefront::Storefront;
use miracle_storefront::cart::CartSource;

use super::{CommandError, print_cart};

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        product: i64,
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Change a line's quantity; 0 removes it
    Update {
        /// Line ID as shown by `cart show`
        line: i64,
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Line ID as shown by `cart show`
        line: i64,
    },
    /// Empty the local cart
    Clear,
}

pub async fn run(storefront: &Storefront, command: CartCommand) -> Result<(), CommandError> {
    let cart = storefront.cart();

    match command {
        CartCommand::Show => {
            let loaded = cart.load().await;
            let source = match loaded.source {
                CartSource::Server => "account",
                CartSource::Session => "session",
                CartSource::Guest => "saved",
            };
            println!("Cart ({source}):");
            print_cart(&loaded.snapshot);
        }
        CartCommand::Add { product, quantity } => {
            // Line ids in the local copy must match the current remote cart.
            cart.load().await;
            print_cart(&cart.add(ProductId::new(product), quantity).await?);
        }
        CartCommand::Update { line, quantity } => {
            cart.load().await;
            print_cart(&cart.set_quantity(CartItemId::new(line), quantity).await?);
        }
        CartCommand::Remove { line } => {
            cart.load().await;
            print_cart(&cart.remove(CartItemId::new(line)).await?);
        }
        CartCommand::Clear => {
            cart.clear();
            println!("Local cart cleared.");
        }
    }
    Ok(())
}
