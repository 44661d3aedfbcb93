//! Catalog browsing commands.

use miracle_core::ProductId;
use miracle_storefront::Storefront;
use miracle_storefront::catalog::Product;

use super::CommandError;

/// List products, optionally within one category.
pub async fn products(storefront: &Storefront, category: Option<&str>) -> Result<(), CommandError> {
    let products = match category {
        Some(name) => storefront.catalog().products_by_category(name).await?,
        None => storefront.catalog().fetch_products().await?,
    };

    if products.is_empty() {
        println!("No products found.");
    }
    for product in &products {
        print_product_line(product);
    }
    Ok(())
}

pub async fn product(storefront: &Storefront, id: i64) -> Result<(), CommandError> {
    let product = storefront.catalog().fetch_product(ProductId::new(id)).await?;

    print_product_line(&product);
    if let Some(category) = &product.category {
        println!("Category: {}", category.name);
    }
    if let Some(stock) = product.stock {
        println!("Stock:    {stock}");
    }
    if let Some(image) = &product.image {
        println!("Image:    {image}");
    }
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    Ok(())
}

pub async fn categories(storefront: &Storefront) -> Result<(), CommandError> {
    for category in storefront.catalog().fetch_categories().await? {
        match &category.description {
            Some(description) if !description.is_empty() => {
                println!("[{}] {} - {}", category.id, category.name, description);
            }
            _ => println!("[{}] {}", category.id, category.name),
        }
    }
    Ok(())
}

pub async fn recipes(storefront: &Storefront) -> Result<(), CommandError> {
    for recipe in storefront.catalog().fetch_recipes().await? {
        println!("[{}] {}", recipe.id, recipe.title);
        for ingredient in &recipe.ingredients {
            println!("  - {ingredient}");
        }
        for (n, step) in recipe.instructions.iter().enumerate() {
            println!("  {}. {step}", n + 1);
        }
        if !recipe.benefits.is_empty() {
            println!("  Benefits: {}", recipe.benefits);
        }
    }
    Ok(())
}

pub async fn videos(storefront: &Storefront) -> Result<(), CommandError> {
    let api = storefront.api();
    for video in storefront.catalog().fetch_about_videos().await? {
        let title = video.title.as_deref().unwrap_or("Untitled");
        let link = video
            .youtube_embed_url()
            .or_else(|| {
                video
                    .stream_path()
                    .and_then(|path| api.endpoint(&path).ok())
                    .map(String::from)
            })
            .unwrap_or_default();
        println!("[{}] {title} {link}", video.id);
    }
    Ok(())
}

fn print_product_line(product: &Product) {
    let availability = if product.is_available() {
        ""
    } else {
        " (unavailable)"
    };
    println!(
        "[{}] {} - {}{availability}",
        product.id, product.name, product.price
    );
}
