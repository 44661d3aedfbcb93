//! Guest cart persisted in the local key-value store.

use std::sync::Arc;

use miracle_core::CartSnapshot;
use serde_json::Value;
use url::Url;

use super::normalize::{UNNAMED_PRODUCT, normalize_items};
use crate::storage::KeyValueStore;

/// Storage key of the guest cart.
pub const GUEST_CART_KEY: &str = "guest_cart";

/// The cart used while no one is logged in, and the local mirror of the
/// remote cart while someone is.
///
/// Reads never fail: unreadable state is an empty cart. Writes log and
/// swallow storage errors.
#[derive(Clone)]
pub struct GuestCartStore {
    store: Arc<dyn KeyValueStore>,
    base_url: Url,
}

impl std::fmt::Debug for GuestCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestCartStore")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl GuestCartStore {
    /// Create a guest store. `base_url` resolves relative image paths.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, base_url: Url) -> Self {
        Self { store, base_url }
    }

    /// Read the persisted cart, dropping entries that cannot be repaired.
    #[must_use]
    pub fn read(&self) -> CartSnapshot {
        let value = match self.store.get(GUEST_CART_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return CartSnapshot::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read guest cart, treating as empty");
                return CartSnapshot::new();
            }
        };

        match value {
            Value::Array(items) => normalize_items(items, &self.base_url, UNNAMED_PRODUCT),
            other => {
                tracing::warn!(kind = %json_kind(&other), "Guest cart is not a list, treating as empty");
                CartSnapshot::new()
            }
        }
    }

    /// Replace the persisted cart.
    pub fn write(&self, snapshot: &CartSnapshot) {
        let result = serde_json::to_value(snapshot)
            .map_err(crate::storage::StoreError::from)
            .and_then(|value| self.store.set(GUEST_CART_KEY, &value));

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist guest cart");
        }
    }

    /// Persist an empty cart.
    pub fn clear(&self) {
        self.write(&CartSnapshot::new());
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use miracle_core::{CartItemId, CartLineItem, Price, ProductId, ProductSummary, Quantity};
    use serde_json::json;

    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    fn guest(store: Arc<dyn KeyValueStore>) -> GuestCartStore {
        GuestCartStore::new(store, Url::parse("http://localhost:8000/").unwrap())
    }

    fn line(id: i64, product: i64, qty: i64) -> CartLineItem {
        CartLineItem {
            id: CartItemId::new(id),
            product: ProductSummary {
                id: ProductId::new(product),
                name: "Moringa Powder".to_string(),
                description: "Dried leaf".to_string(),
                price: Price::from_cents(1250),
                image: Some("http://localhost:8000/media/p.png".to_string()),
            },
            quantity: Quantity::coerce(qty),
        }
    }

    #[test]
    fn test_round_trip() {
        let store = guest(Arc::new(MemoryStore::new()));
        let cart = CartSnapshot::from_items([line(1, 10, 2), line(2, 11, 1)]);

        store.write(&cart);
        assert_eq!(store.read(), cart);
    }

    #[test]
    fn test_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = guest(Arc::new(FileStore::open(dir.path()).unwrap()));
        let cart = CartSnapshot::from_items([line(5, 3, 4)]);

        store.write(&cart);
        assert_eq!(store.read(), cart);
    }

    #[test]
    fn test_missing_is_empty() {
        let store = guest(Arc::new(MemoryStore::new()));
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_non_list_is_empty() {
        let backing = Arc::new(MemoryStore::new());
        backing.set(GUEST_CART_KEY, &json!({"items": []})).unwrap();
        assert!(guest(backing).read().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("guest_cart.json"), b"[{\"id\": 1,").unwrap();
        let store = guest(Arc::new(FileStore::open(dir.path()).unwrap()));
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_entries_repaired_or_dropped() {
        let backing = Arc::new(MemoryStore::new());
        backing
            .set(
                GUEST_CART_KEY,
                &json!([
                    null,
                    {"id": 1, "product": "oops", "quantity": 1},
                    {"id": 2, "product": {"id": "8", "price": "3.5", "image": "media/x.png"}, "quantity": 0}
                ]),
            )
            .unwrap();

        let cart = guest(backing).read();
        assert_eq!(cart.len(), 1);
        let only = cart.items().first().unwrap();
        assert_eq!(only.product.id, ProductId::new(8));
        assert_eq!(only.product.name, "Unnamed");
        assert_eq!(only.product.price, Price::from_cents(350));
        assert_eq!(only.product.image.as_deref(), Some("http://localhost:8000/media/x.png"));
        assert_eq!(only.quantity, Quantity::ONE);
    }

    #[test]
    fn test_clear() {
        let store = guest(Arc::new(MemoryStore::new()));
        store.write(&CartSnapshot::from_items([line(1, 10, 2)]));
        store.clear();
        assert!(store.read().is_empty());
    }
}
