//! Cart drawer and header badge.

use serde::Serialize;

use crate::domain::aggregates::{CartLineItem, CartState};
use crate::domain::pricing::PriceDisplay;

pub const EMPTY_MESSAGE: &str = "Количката е празна";
pub const ORDER_LABEL: &str = "Поръчай сега";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DrawerLine {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub href: String,
    pub quantity: u32,
    pub unit_price: PriceDisplay,
    pub line_total: PriceDisplay,
}

impl DrawerLine {
    fn from_item(item: &CartLineItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title_bg.clone(),
            image: item.image.clone(),
            href: product_href(&item.slug),
            quantity: item.quantity,
            unit_price: PriceDisplay::of(item.price),
            line_total: PriceDisplay::of(item.line_total()),
        }
    }
}

/// Cart lines keep only the slug, so they link through the generic product route.
fn product_href(slug: &str) -> String { format!("/products/{slug}") }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartDrawerView {
    pub is_open: bool,
    /// Sum of quantities, shown on the header badge.
    pub badge_count: u32,
    pub lines: Vec<DrawerLine>,
    pub total: PriceDisplay,
    pub empty_message: Option<&'static str>,
    pub order_label: &'static str,
}

impl CartDrawerView {
    pub fn from_state(state: &CartState) -> Self {
        Self {
            is_open: state.is_open,
            badge_count: state.item_count(),
            lines: state.items.iter().map(DrawerLine::from_item).collect(),
            total: PriceDisplay::of(state.total),
            empty_message: state.items.is_empty().then_some(EMPTY_MESSAGE),
            order_label: ORDER_LABEL,
        }
    }
}

/// Response to "Order now". Ordering is not wired to anything; the cart is
/// left exactly as it was.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderAcknowledgement {
    pub accepted: bool,
    pub message: &'static str,
}

pub fn order_now(state: &CartState) -> OrderAcknowledgement {
    tracing::info!(lines = state.items.len(), "order button pressed; no order flow is configured");
    OrderAcknowledgement { accepted: false, message: "Поръчките се приемат по телефона или чрез формата за контакт." }
}
