//! Display view-models built from domain state.
pub mod cart_drawer;
pub mod product_card;

pub use cart_drawer::{CartDrawerView, DrawerLine, OrderAcknowledgement};
pub use product_card::{ProductCard, ProductDetailView};
