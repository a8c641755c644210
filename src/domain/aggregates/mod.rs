//! Aggregates module
pub mod blog_post;
pub mod cart;
pub mod inquiry;
pub mod product;

pub use blog_post::{BlogPost, BlogPostError, BlogPostUpdate, NewDraft, PostStatus};
pub use cart::{Cart, CartLineItem, CartState};
pub use inquiry::{ContactInquiry, InquiryStatus, NewInquiry};
pub use product::{Product, ProductCategory, ProductCertificate, ProductRow, Vertical};
