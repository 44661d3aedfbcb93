//! Back-office commands.
//!
//! Every command requires a logged-in administrator.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use miracle_admin::{
    AdminClient, CategoryInput, CouponInput, ImageUpload, ProductInput, RecipeInput,
};
use miracle_core::{CategoryId, CouponId, ProductId, RecipeId};
use miracle_storefront::Storefront;
use rust_decimal::Decimal;

use super::CommandError;

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: CategoryCommand,
    },
    /// Manage products
    Products {
        #[command(subcommand)]
        action: ProductCommand,
    },
    /// Manage coupons
    Coupons {
        #[command(subcommand)]
        action: CouponCommand,
    },
    /// Manage recipes
    Recipes {
        #[command(subcommand)]
        action: RecipeCommand,
    },
    /// List registered users
    Users,
    /// Show user counts
    UserCount,
}

#[derive(Subcommand)]
pub enum CategoryCommand {
    List,
    Create(CategoryArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: CategoryArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
pub struct CategoryArgs {
    #[arg(short, long)]
    name: String,
    #[arg(short, long)]
    description: Option<String>,
}

#[derive(Subcommand)]
pub enum ProductCommand {
    List,
    Create(ProductArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: ProductArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
pub struct ProductArgs {
    #[arg(short, long)]
    name: String,
    #[arg(short, long, default_value = "")]
    description: String,
    #[arg(short, long)]
    price: Decimal,
    #[arg(short, long, default_value_t = 0)]
    stock: i64,
    /// Category ID
    #[arg(short, long)]
    category: Option<i64>,
    /// Hide the product from the storefront
    #[arg(long)]
    inactive: bool,
    /// Image file to upload
    #[arg(short, long)]
    image: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CouponCommand {
    List,
    Create(CouponArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: CouponArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
pub struct CouponArgs {
    #[arg(short, long)]
    code: String,
    /// Percentage off
    #[arg(short, long)]
    discount: Decimal,
    #[arg(long)]
    inactive: bool,
    /// RFC 3339 start time
    #[arg(long)]
    valid_from: Option<DateTime<Utc>>,
    /// RFC 3339 end time
    #[arg(long)]
    valid_to: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
pub enum RecipeCommand {
    List,
    Create(RecipeArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: RecipeArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
pub struct RecipeArgs {
    #[arg(short, long)]
    title: String,
    /// One ingredient; repeat for more
    #[arg(long = "ingredient")]
    ingredients: Vec<String>,
    /// One instruction step; repeat for more
    #[arg(long = "step")]
    instructions: Vec<String>,
    #[arg(short, long, default_value = "")]
    benefits: String,
    #[arg(short, long)]
    image: Option<PathBuf>,
}

pub async fn run(storefront: &Storefront, command: AdminCommand) -> Result<(), CommandError> {
    let admin = AdminClient::new(storefront);

    match command {
        AdminCommand::Categories { action } => categories(&admin, action).await,
        AdminCommand::Products { action } => products(&admin, action).await,
        AdminCommand::Coupons { action } => coupons(&admin, action).await,
        AdminCommand::Recipes { action } => recipes(&admin, action).await,
        AdminCommand::Users => {
            for user in admin.list_users().await? {
                println!("{} <{}>", user.display_name(), user.email);
            }
            Ok(())
        }
        AdminCommand::UserCount => {
            let count = admin.user_count().await?;
            println!("Total users:  {}", count.total_users);
            println!("Active users: {}", count.active_users);
            Ok(())
        }
    }
}

async fn categories(admin: &AdminClient, command: CategoryCommand) -> Result<(), CommandError> {
    match command {
        CategoryCommand::List => {
            for category in admin.list_categories().await? {
                println!("[{}] {}", category.id, category.name);
            }
        }
        CategoryCommand::Create(fields) => {
            let category = admin.create_category(&fields.into()).await?;
            println!("Created category {}", category.id);
        }
        CategoryCommand::Update { id, fields } => {
            admin
                .update_category(CategoryId::new(id), &fields.into())
                .await?;
            println!("Updated category {id}");
        }
        CategoryCommand::Delete { id } => {
            admin.delete_category(CategoryId::new(id)).await?;
            println!("Deleted category {id}");
        }
    }
    Ok(())
}

async fn products(admin: &AdminClient, command: ProductCommand) -> Result<(), CommandError> {
    match command {
        ProductCommand::List => {
            for product in admin.list_products().await? {
                let state = if product.is_active { "" } else { " (inactive)" };
                println!(
                    "[{}] {} - {} stock {}{state}",
                    product.id,
                    product.name,
                    product.price,
                    product.stock.unwrap_or_default()
                );
            }
        }
        ProductCommand::Create(fields) => {
            let product = admin.create_product(&fields.into_input()?).await?;
            println!("Created product {}", product.id);
        }
        ProductCommand::Update { id, fields } => {
            admin
                .update_product(ProductId::new(id), &fields.into_input()?)
                .await?;
            println!("Updated product {id}");
        }
        ProductCommand::Delete { id } => {
            admin.delete_product(ProductId::new(id)).await?;
            println!("Deleted product {id}");
        }
    }
    Ok(())
}

async fn coupons(admin: &AdminClient, command: CouponCommand) -> Result<(), CommandError> {
    match command {
        CouponCommand::List => {
            for coupon in admin.list_coupons().await? {
                let id = coupon.id.map(|id| id.to_string()).unwrap_or_default();
                println!("[{id}] {} - {}%", coupon.code, coupon.discount);
            }
        }
        CouponCommand::Create(fields) => {
            let coupon = admin.create_coupon(&fields.into()).await?;
            println!("Created coupon {}", coupon.code);
        }
        CouponCommand::Update { id, fields } => {
            admin.update_coupon(CouponId::new(id), &fields.into()).await?;
            println!("Updated coupon {id}");
        }
        CouponCommand::Delete { id } => {
            admin.delete_coupon(CouponId::new(id)).await?;
            println!("Deleted coupon {id}");
        }
    }
    Ok(())
}

async fn recipes(admin: &AdminClient, command: RecipeCommand) -> Result<(), CommandError> {
    match command {
        RecipeCommand::List => {
            for recipe in admin.list_recipes().await? {
                println!("[{}] {}", recipe.id, recipe.title);
            }
        }
        RecipeCommand::Create(fields) => {
            let recipe = admin.create_recipe(&fields.into_input()?).await?;
            println!("Created recipe {}", recipe.id);
        }
        RecipeCommand::Update { id, fields } => {
            admin
                .update_recipe(RecipeId::new(id), &fields.into_input()?)
                .await?;
            println!("Updated recipe {id}");
        }
        RecipeCommand::Delete { id } => {
            admin.delete_recipe(RecipeId::new(id)).await?;
            println!("Deleted recipe {id}");
        }
    }
    Ok(())
}

// =============================================================================
// Argument conversion
// =============================================================================

impl From<CategoryArgs> for CategoryInput {
    fn from(args: CategoryArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
        }
    }
}

impl From<CouponArgs> for CouponInput {
    fn from(args: CouponArgs) -> Self {
        Self {
            code: args.code,
            discount: args.discount,
            is_active: Some(!args.inactive),
            valid_from: args.valid_from,
            valid_to: args.valid_to,
        }
    }
}

impl ProductArgs {
    fn into_input(self) -> Result<ProductInput, CommandError> {
        Ok(ProductInput {
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            category_id: self.category.map(CategoryId::new),
            is_active: !self.inactive,
            image: read_image(self.image)?,
        })
    }
}

impl RecipeArgs {
    fn into_input(self) -> Result<RecipeInput, CommandError> {
        Ok(RecipeInput {
            title: self.title,
            ingredients: self.ingredients,
            instructions: self.instructions,
            benefits: self.benefits,
            image: read_image(self.image)?,
        })
    }
}

fn read_image(path: Option<PathBuf>) -> Result<Option<ImageUpload>, CommandError> {
    path.map(|p| ImageUpload::from_path(&p))
        .transpose()
        .map_err(|e| miracle_admin::AdminError::Upload(e).into())
}
