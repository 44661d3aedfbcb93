//! Normalization of loosely-shaped cart JSON into [`CartSnapshot`]s.
//!
//! The backend answers `GET /cart/` with either a bare array or an
//! `{ "items": [...] }` envelope, and its items come in three shapes:
//!
//! - authenticated rows: `{ id, product: <id>, product_details: {...}, quantity }`
//! - embedded product: `{ id, product: {...}, quantity }` (also the guest
//!   store's own format)
//! - session rows: `{ id, product_id, product_name, price, image, description, quantity }`
//!
//! Every shape is an arm of [`RawCartItem`] and is converted in
//! [`normalize_item`]. Entries matching no arm are dropped with a warning.

use miracle_core::{CartItemId, CartLineItem, CartSnapshot, Price, ProductId, ProductSummary, Quantity};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::api::absolute_url;

/// Name given to guest-cart products stored without one.
pub const UNNAMED_PRODUCT: &str = "Unnamed";

/// Response envelope of `GET /cart/`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CartEnvelope {
    Items(Vec<Value>),
    Wrapped { items: Vec<Value> },
}

/// Product fields as they appear nested in a cart row.
#[derive(Debug, Default, Deserialize)]
struct RawProduct {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    image: Option<Value>,
}

/// The cart item shapes the client understands.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCartItem {
    Detailed {
        #[serde(default)]
        id: Option<Value>,
        product_details: RawProduct,
        #[serde(default)]
        product: Option<Value>,
        #[serde(default)]
        quantity: Option<Value>,
    },
    Embedded {
        #[serde(default)]
        id: Option<Value>,
        product: RawProduct,
        #[serde(default)]
        quantity: Option<Value>,
    },
    Flat {
        #[serde(default)]
        id: Option<Value>,
        product_id: Value,
        #[serde(default)]
        product_name: Option<Value>,
        #[serde(default)]
        price: Option<Value>,
        #[serde(default)]
        image: Option<Value>,
        #[serde(default)]
        description: Option<Value>,
        #[serde(default)]
        quantity: Option<Value>,
    },
}

/// Normalize a `GET /cart/` body.
///
/// An unrecognized envelope yields an empty cart.
#[must_use]
pub fn normalize_cart(body: Value, base: &Url) -> CartSnapshot {
    let items = match serde_json::from_value::<CartEnvelope>(body) {
        Ok(CartEnvelope::Items(items) | CartEnvelope::Wrapped { items }) => items,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognized cart response shape, treating as empty");
            return CartSnapshot::new();
        }
    };
    normalize_items(items, base, "")
}

/// Normalize a list of raw items, dropping any that match no known shape.
#[must_use]
pub fn normalize_items(items: Vec<Value>, base: &Url, default_name: &str) -> CartSnapshot {
    items
        .into_iter()
        .filter_map(|item| normalize_item(item, base, default_name))
        .collect()
}

/// Normalize a single raw item.
///
/// Quantity is floored to one, a missing product id becomes 0, a missing
/// price becomes zero and the image is made absolute against `base`.
#[must_use]
pub fn normalize_item(item: Value, base: &Url, default_name: &str) -> Option<CartLineItem> {
    let raw = match serde_json::from_value::<RawCartItem>(item) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed cart item");
            return None;
        }
    };

    let (line_id, product, quantity) = match raw {
        RawCartItem::Detailed {
            id,
            product_details,
            product,
            quantity,
        } => {
            let product_id = product_details
                .id
                .as_ref()
                .and_then(as_int)
                .or_else(|| product.as_ref().and_then(as_int));
            (id, summarize(product_details, product_id, base, default_name), quantity)
        }
        RawCartItem::Embedded {
            id,
            product,
            quantity,
        } => {
            let product_id = product.id.as_ref().and_then(as_int);
            (id, summarize(product, product_id, base, default_name), quantity)
        }
        RawCartItem::Flat {
            id,
            product_id,
            product_name,
            price,
            image,
            description,
            quantity,
        } => {
            let product = RawProduct {
                id: None,
                name: product_name,
                description,
                price,
                image,
            };
            let product_id = as_int(&product_id).or_else(|| id.as_ref().and_then(as_int));
            (id, summarize(product, product_id, base, default_name), quantity)
        }
    };

    let line_id = line_id
        .as_ref()
        .and_then(as_int)
        .unwrap_or_else(|| product.id.as_i64());
    let quantity = Quantity::coerce(quantity.as_ref().and_then(as_int).unwrap_or(1));

    Some(CartLineItem {
        id: CartItemId::new(line_id),
        product,
        quantity,
    })
}

fn summarize(raw: RawProduct, id: Option<i64>, base: &Url, default_name: &str) -> ProductSummary {
    ProductSummary {
        id: ProductId::new(id.unwrap_or(0)),
        name: raw
            .name
            .as_ref()
            .and_then(as_text)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name.to_string()),
        description: raw.description.as_ref().and_then(as_text).unwrap_or_default(),
        price: Price::from_json(raw.price.as_ref()),
        image: absolute_url(base, raw.image.as_ref().and_then(Value::as_str)),
    }
}

/// Read an integer out of a number or numeric string.
#[allow(clippy::cast_possible_truncation)]
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:8000/").unwrap()
    }

    #[test]
    fn test_authenticated_shape() {
        let body = json!({
            "id": 1,
            "user": 4,
            "items": [{
                "id": 31,
                "product": 7,
                "product_details": {
                    "id": 7,
                    "name": "Moringa Powder",
                    "price": "12.50",
                    "image": "/media/products/powder.png"
                },
                "quantity": 2,
                "subtotal": "25.00"
            }],
            "total_items": 2
        });

        let cart = normalize_cart(body, &base());
        let line = cart.items().first().unwrap();
        assert_eq!(line.id, CartItemId::new(31));
        assert_eq!(line.product.id, ProductId::new(7));
        assert_eq!(line.product.price, Price::from_cents(1250));
        assert_eq!(
            line.product.image.as_deref(),
            Some("http://localhost:8000/media/products/powder.png")
        );
        assert_eq!(line.quantity.get(), 2);
    }

    #[test]
    fn test_session_shape() {
        let body = json!({
            "items": [{
                "id": "7",
                "product_id": 7,
                "product_name": "Moringa Tea",
                "quantity": 3,
                "price": "4.00",
                "image": null,
                "description": "Leaf tea"
            }]
        });

        let cart = normalize_cart(body, &base());
        let line = cart.find_by_product(ProductId::new(7)).unwrap();
        assert_eq!(line.id, CartItemId::new(7));
        assert_eq!(line.product.name, "Moringa Tea");
        assert_eq!(line.product.description, "Leaf tea");
        assert!(line.product.image.is_none());
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_bare_array_and_embedded_shape() {
        let body = json!([{
            "id": 1_700_000_000_000_i64,
            "product": {"id": 3, "name": "Capsules", "price": 9},
            "quantity": "2"
        }]);
        let cart = normalize_cart(body, &base());
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.subtotal(), Price::from_cents(1800));
    }

    #[test]
    fn test_quantity_and_defaults_coerced() {
        let items = vec![
            json!({"product": {"id": 1}, "quantity": 0}),
            json!({"product": {"id": 2, "price": "oops"}, "quantity": "many"}),
            json!({"product": {}, "quantity": -4}),
        ];
        let cart = normalize_items(items, &base(), UNNAMED_PRODUCT);

        assert_eq!(cart.len(), 3);
        assert!(cart.iter().all(|l| l.quantity == Quantity::ONE));
        assert!(cart.iter().all(|l| l.product.name == UNNAMED_PRODUCT));
        let second = cart.find_by_product(ProductId::new(2)).unwrap();
        assert_eq!(second.product.price, Price::ZERO);
        assert!(cart.find_by_product(ProductId::new(0)).is_some());
    }

    #[test]
    fn test_malformed_items_dropped() {
        let items = vec![
            json!("not an object"),
            json!(42),
            json!({"product": 5, "quantity": 1}),
            json!({"quantity": 1}),
            json!({"product": {"id": 9, "name": "Soap"}, "quantity": 1}),
        ];
        let cart = normalize_items(items, &base(), UNNAMED_PRODUCT);
        assert_eq!(cart.len(), 1);
        assert!(cart.find_by_product(ProductId::new(9)).is_some());
    }

    #[test]
    fn test_unknown_envelope_is_empty() {
        assert!(normalize_cart(json!({"detail": "oops"}), &base()).is_empty());
        assert!(normalize_cart(json!(null), &base()).is_empty());
    }

    #[test]
    fn test_duplicate_products_coalesced() {
        let body = json!([
            {"id": 1, "product_id": 4, "quantity": 1},
            {"id": 2, "product_id": 4, "quantity": 2}
        ]);
        let cart = normalize_cart(body, &base());
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total_items(), 3);
    }
}
