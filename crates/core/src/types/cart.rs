//! Cart line items and snapshots.
//!
//! A [`CartSnapshot`] is an ordered list of [`CartLineItem`]s that behaves as
//! a set keyed by product id: every constructor and mutator coalesces lines
//! for the same product instead of duplicating them. Quantities are always
//! at least one; setting a quantity below one removes the line.

use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId};
use super::price::Price;

/// Sales tax applied at checkout, in percent.
pub const TAX_PERCENT: u32 = 8;

// =============================================================================
// Quantity
// =============================================================================

/// A line-item quantity, never below one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

/// Error returned when a quantity below one is deserialized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("quantity must be at least 1 (got {0})")]
pub struct InvalidQuantity(pub i64);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity, rejecting values below one.
    #[must_use]
    pub fn new(n: i64) -> Option<Self> {
        if n < 1 {
            return None;
        }
        Some(Self(u32::try_from(n).unwrap_or(u32::MAX)))
    }

    /// Create a quantity, flooring anything below one to one.
    #[must_use]
    pub fn coerce(n: i64) -> Self {
        Self::new(n).unwrap_or(Self::ONE)
    }

    /// The raw count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Sum of two quantities, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = InvalidQuantity;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        Self::new(n).ok_or(InvalidQuantity(n))
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Line items
// =============================================================================

/// Product data embedded in a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    /// Absolute image URL, if the product has one.
    #[serde(default)]
    pub image: Option<String>,
}

/// One (product, quantity) pair within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Server cart-row id for remote carts; a locally generated id for guest
    /// lines.
    pub id: CartItemId,
    pub product: ProductSummary,
    pub quantity: Quantity,
}

impl CartLineItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity.get())
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// An ordered cart, unique by product id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLineItem>", into = "Vec<CartLineItem>")]
pub struct CartSnapshot {
    items: Vec<CartLineItem>,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a snapshot, coalescing lines that reference the same product.
    ///
    /// The first line for a product keeps its id and position; later
    /// duplicates contribute their quantity.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut snapshot = Self::new();
        for item in items {
            snapshot.upsert_adding(item);
        }
        snapshot
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartLineItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn find_by_product(&self, product_id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| i.product.id == product_id)
    }

    #[must_use]
    pub fn find_by_line(&self, line_id: CartItemId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| i.id == line_id)
    }

    /// Add a line, summing into an existing line for the same product.
    pub fn upsert_adding(&mut self, item: CartLineItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.product.id == item.product.id)
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Set the quantity of a line. A quantity below one removes the line.
    ///
    /// Returns `false` if no line has the given id.
    pub fn set_quantity(&mut self, line_id: CartItemId, quantity: i64) -> bool {
        match Quantity::new(quantity) {
            Some(q) => match self.items.iter_mut().find(|i| i.id == line_id) {
                Some(line) => {
                    line.quantity = q;
                    true
                }
                None => false,
            },
            None => self.remove_line(line_id).is_some(),
        }
    }

    /// Remove a line by id.
    pub fn remove_line(&mut self, line_id: CartItemId) -> Option<CartLineItem> {
        let pos = self.items.iter().position(|i| i.id == line_id)?;
        Some(self.items.remove(pos))
    }

    /// Remove a line by product id.
    pub fn remove_product(&mut self, product_id: ProductId) -> Option<CartLineItem> {
        let pos = self.items.iter().position(|i| i.product.id == product_id)?;
        Some(self.items.remove(pos))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Next id for a locally created line.
    ///
    /// Time-based (epoch millis), bumped past any existing id so two lines
    /// created within the same millisecond stay distinct.
    #[must_use]
    pub fn next_guest_id(&self) -> CartItemId {
        let now = chrono::Utc::now().timestamp_millis();
        let max = self.items.iter().map(|i| i.id.as_i64()).max().unwrap_or(0);
        CartItemId::new(now.max(max.saturating_add(1)))
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity.get())).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    #[must_use]
    pub fn tax(&self) -> Price {
        self.subtotal().percent(TAX_PERCENT)
    }

    /// Subtotal plus tax. Shipping is free.
    #[must_use]
    pub fn total(&self) -> Price {
        self.subtotal() + self.tax()
    }
}

impl From<Vec<CartLineItem>> for CartSnapshot {
    fn from(items: Vec<CartLineItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<CartSnapshot> for Vec<CartLineItem> {
    fn from(snapshot: CartSnapshot) -> Self {
        snapshot.items
    }
}

impl FromIterator<CartLineItem> for CartSnapshot {
    fn from_iter<T: IntoIterator<Item = CartLineItem>>(iter: T) -> Self {
        Self::from_items(iter)
    }
}

impl<'a> IntoIterator for &'a CartSnapshot {
    type Item = &'a CartLineItem;
    type IntoIter = std::slice::Iter<'a, CartLineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, product: i64, qty: i64, cents: i64) -> CartLineItem {
        CartLineItem {
            id: CartItemId::new(id),
            product: ProductSummary {
                id: ProductId::new(product),
                name: format!("Product {product}"),
                description: String::new(),
                price: Price::from_cents(cents),
                image: None,
            },
            quantity: Quantity::coerce(qty),
        }
    }

    #[test]
    fn test_quantity_floor() {
        assert!(Quantity::new(0).is_none());
        assert!(Quantity::new(-3).is_none());
        assert_eq!(Quantity::coerce(-3), Quantity::ONE);
        assert_eq!(Quantity::coerce(4).get(), 4);
    }

    #[test]
    fn test_quantity_rejects_zero_on_deserialize() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("2").unwrap().get(), 2);
    }

    #[test]
    fn test_from_items_coalesces_duplicate_products() {
        let cart = CartSnapshot::from_items([line(1, 10, 2, 100), line(2, 10, 3, 100)]);
        assert_eq!(cart.len(), 1);
        let only = cart.find_by_product(ProductId::new(10)).unwrap();
        assert_eq!(only.id, CartItemId::new(1));
        assert_eq!(only.quantity.get(), 5);
    }

    #[test]
    fn test_deserialize_coalesces_duplicates() {
        let json = serde_json::to_string(&vec![line(1, 10, 1, 100), line(2, 10, 1, 100)]).unwrap();
        let cart: CartSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_set_quantity_below_one_removes_line() {
        let mut cart = CartSnapshot::from_items([line(1, 10, 2, 100), line(2, 11, 1, 100)]);
        assert!(cart.set_quantity(CartItemId::new(1), 0));
        assert!(cart.find_by_line(CartItemId::new(1)).is_none());
        assert!(cart.set_quantity(CartItemId::new(2), -1));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_line() {
        let mut cart = CartSnapshot::from_items([line(1, 10, 2, 100)]);
        assert!(!cart.set_quantity(CartItemId::new(99), 3));
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_totals() {
        let cart = CartSnapshot::from_items([line(1, 10, 2, 1250), line(2, 11, 1, 500)]);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.subtotal(), Price::from_cents(3000));
        assert_eq!(cart.tax(), Price::from_cents(240));
        assert_eq!(cart.total(), Price::from_cents(3240));
    }

    #[test]
    fn test_next_guest_id_is_unique() {
        let far_future = i64::MAX - 10;
        let cart = CartSnapshot::from_items([line(far_future, 10, 1, 100)]);
        assert_eq!(cart.next_guest_id().as_i64(), far_future + 1);
    }
}
