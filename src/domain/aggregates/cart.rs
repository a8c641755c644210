//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::product::Product;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{sanitize_price, Quantity};

/// One cart line. Title, price and image are snapshots taken when the
/// product was first added and are never refreshed from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: String,
    pub title_bg: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub slug: String,
    pub quantity: u32,
}

impl CartLineItem {
    pub fn new(id: impl Into<String>, title_bg: impl Into<String>, price: Decimal, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(), title_bg: title_bg.into(), price: sanitize_price(price),
            image: None, slug: slug.into(), quantity: 1,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(), title_bg: product.title.clone(), price: sanitize_price(product.price),
            image: product.image.clone(), slug: product.slug.clone(), quantity: 1,
        }
    }

    /// Saturates at `Decimal::MAX` instead of overflowing.
    pub fn line_total(&self) -> Decimal {
        self.price.checked_mul(Decimal::from(self.quantity)).unwrap_or(Decimal::MAX)
    }
}

/// Read-only view of a cart, the shape every subscriber receives.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    pub items: Vec<CartLineItem>,
    pub is_open: bool,
    pub total: Decimal,
}

impl CartState {
    pub fn item_count(&self) -> u32 { self.items.iter().fold(0u32, |n, i| n.saturating_add(i.quantity)) }
}

/// Visitor cart: line items keyed by product id in insertion order, plus
/// drawer visibility. The total is always recomputed from the lines.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartLineItem>,
    is_open: bool,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &[CartLineItem] { &self.items }
    pub fn is_open(&self) -> bool { self.is_open }
    pub fn line_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item_count(&self) -> u32 { self.items.iter().fold(0u32, |n, i| n.saturating_add(i.quantity)) }

    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(CartLineItem::line_total)
            .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line))
            .unwrap_or(Decimal::MAX)
    }

    pub fn state(&self) -> CartState {
        CartState { items: self.items.clone(), is_open: self.is_open, total: self.total() }
    }

    /// Adds `quantity` units of `candidate`. A line with the same id gets its
    /// quantity increased and keeps its original snapshot; otherwise a new line
    /// is appended. Quantities below one are treated as one.
    pub fn add_item(&mut self, candidate: CartLineItem, quantity: i64) {
        let quantity = Quantity::new(quantity);
        let product_id = candidate.id.clone();
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == candidate.id) {
            existing.quantity = Quantity::new(i64::from(existing.quantity)).add(quantity).value();
        } else {
            self.items.push(CartLineItem {
                price: sanitize_price(candidate.price),
                quantity: quantity.value(),
                ..candidate
            });
        }
        self.raise_event(CartEvent::ItemAdded { product_id, quantity: quantity.value() });
    }

    /// Removes the line for `product_id`; returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != product_id);
        let removed = self.items.len() != before;
        if removed {
            self.raise_event(CartEvent::ItemRemoved { product_id: product_id.to_string() });
        }
        removed
    }

    /// Sets a line's quantity, clamped to at least one. Unknown ids are ignored.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == product_id) else { return false };
        item.quantity = Quantity::new(quantity).value();
        let quantity = item.quantity;
        self.raise_event(CartEvent::QuantityChanged { product_id: product_id.to_string(), quantity });
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.raise_event(CartEvent::Cleared);
    }

    pub fn open(&mut self) {
        self.is_open = true;
        self.raise_event(CartEvent::Opened);
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.raise_event(CartEvent::Closed);
    }

    /// Serializes the lines as a best-effort local snapshot.
    pub fn snapshot(&self) -> String {
        serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string())
    }

    /// Rebuilds a closed cart from a snapshot. Unreadable snapshots yield an
    /// empty cart; duplicate ids are merged and quantities re-clamped.
    pub fn restore(snapshot: &str) -> Self {
        let mut cart = Self::new();
        match serde_json::from_str::<Vec<CartLineItem>>(snapshot) {
            Ok(items) => {
                for item in items {
                    let quantity = i64::from(item.quantity);
                    cart.add_item(item, quantity);
                }
            }
            Err(err) => tracing::warn!(error = %err, "discarding unreadable cart snapshot"),
        }
        cart.events.clear();
        cart
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: CartEvent) { self.events.push(DomainEvent::Cart(e)); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, price: Decimal) -> CartLineItem {
        CartLineItem::new(id, "Бабо, разкажи ни!", price, "babo-razkazhi-ni")
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(5870, 2)), 1);
        cart.add_item(book("P1", Decimal::new(5870, 2)), 2);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.items()[0].line_total(), Decimal::new(17610, 2));
        assert_eq!(cart.total(), Decimal::new(17610, 2));
    }

    #[test]
    fn test_same_id_never_duplicates() {
        let mut cart = Cart::new();
        for qty in [1, 4, 2, 7] {
            cart.add_item(book("P1", Decimal::new(10, 0)), qty);
        }
        cart.add_item(book("P2", Decimal::new(5, 0)), 1);
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.items()[0].quantity, 14);
        assert_eq!(cart.items()[1].id, "P2");
    }

    #[test]
    fn test_snapshot_is_frozen_at_add_time() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(10, 0)), 1);
        let mut repriced = book("P1", Decimal::new(99, 0));
        repriced.title_bg = "Renamed".into();
        cart.add_item(repriced, 1);
        assert_eq!(cart.items()[0].price, Decimal::new(10, 0));
        assert_eq!(cart.items()[0].title_bg, "Бабо, разкажи ни!");
        assert_eq!(cart.total(), Decimal::new(20, 0));
    }

    #[test]
    fn test_total_tracks_every_mutation() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(1250, 2)), 2);
        cart.add_item(book("P2", Decimal::new(300, 2)), 1);
        assert_eq!(cart.total(), Decimal::new(2800, 2));
        cart.update_quantity("P2", 5);
        assert_eq!(cart.total(), Decimal::new(4000, 2));
        cart.remove_item("P1");
        assert_eq!(cart.total(), Decimal::new(1500, 2));
        assert_eq!(cart.state().total, cart.total());
        cart.clear();
        assert_eq!(cart.total(), Decimal::ZERO);
    }

    #[test]
    fn test_update_quantity_clamps_and_ignores_unknown() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(10, 0)), 3);
        assert!(cart.update_quantity("P1", 0));
        assert_eq!(cart.items()[0].quantity, 1);
        assert!(cart.update_quantity("P1", -4));
        assert_eq!(cart.items()[0].quantity, 1);
        assert!(!cart.update_quantity("missing", 2));
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_malformed_input_is_coerced() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(-5, 0)), 0);
        assert_eq!(cart.items()[0].quantity, 1);
        assert_eq!(cart.items()[0].price, Decimal::ZERO);
    }

    #[test]
    fn test_extreme_input_stays_bounded() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(i64::MAX, 0)), i64::MAX);
        cart.add_item(book("P2", Decimal::new(99_999_999, 2)), i64::MAX);
        cart.add_item(book("P2", Decimal::new(99_999_999, 2)), i64::MAX);
        assert_eq!(cart.items()[0].price, Decimal::ZERO);
        assert_eq!(cart.items()[0].quantity, 999);
        assert_eq!(cart.items()[1].quantity, 999);
        assert_eq!(cart.total(), Decimal::new(99_999_999, 2) * Decimal::from(999));
        assert!(cart.update_quantity("P2", i64::MAX));
        assert_eq!(cart.item_count(), 1998);
    }

    #[test]
    fn test_line_total_saturates_instead_of_panicking() {
        let line = CartLineItem { price: Decimal::MAX, quantity: 999, ..book("P1", Decimal::ONE) };
        assert_eq!(line.line_total(), Decimal::MAX);
        let mut cart = Cart::new();
        cart.items.push(line.clone());
        cart.items.push(CartLineItem { id: "P2".into(), ..line });
        assert_eq!(cart.total(), Decimal::MAX);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(10, 0)), 1);
        assert!(!cart.remove_item("P9"));
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_open_close_and_events() {
        let mut cart = Cart::new();
        cart.open();
        assert!(cart.is_open());
        cart.close();
        assert!(!cart.is_open());
        let events = cart.take_events();
        assert_eq!(events, vec![DomainEvent::Cart(CartEvent::Opened), DomainEvent::Cart(CartEvent::Closed)]);
        assert!(cart.take_events().is_empty());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut cart = Cart::new();
        cart.add_item(book("P1", Decimal::new(5870, 2)).with_image("https://cdn/p1.jpg"), 2);
        cart.open();
        let restored = Cart::restore(&cart.snapshot());
        assert_eq!(restored.items(), cart.items());
        assert!(!restored.is_open());
        assert!(Cart::restore("{not json").is_empty());
    }
}
