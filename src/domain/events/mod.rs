//! Domain events
use crate::domain::aggregates::inquiry::InquiryStatus;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Blog(BlogEvent),
    Inquiry(InquiryEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    ItemAdded { product_id: String, quantity: u32 },
    ItemRemoved { product_id: String },
    QuantityChanged { product_id: String, quantity: u32 },
    Cleared,
    Opened,
    Closed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlogEvent {
    DraftCreated { post_id: String, slug: String },
    Saved { post_id: String, slug: String, uploaded_images: usize },
    Published { post_id: String },
    Unpublished { post_id: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum InquiryEvent {
    Received { inquiry_id: String },
    StatusChanged { inquiry_id: String, status: InquiryStatus },
}
