//! Product cards for listings and search, and the detail page payload.

use serde::Serialize;

use crate::domain::aggregates::{CartLineItem, Product, ProductCertificate, Vertical};
use crate::domain::pricing::PriceDisplay;
use crate::services::catalog::ProductDetail;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProductCard {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub href: String,
    pub vertical: Option<Vertical>,
    pub image: Option<String>,
    pub price: PriceDisplay,
    pub compare_price: Option<PriceDisplay>,
    /// Shown as a "-N%" badge; absent when there is no discount.
    pub percent_off: Option<u32>,
    pub badges: Vec<String>,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        let discounted = product.percent_off > 0;
        Self {
            id: product.id.clone(),
            slug: product.slug.clone(),
            title: product.title.clone(),
            href: product.detail_path(),
            vertical: product.vertical(),
            image: product.image.clone(),
            price: PriceDisplay::of(product.price),
            compare_price: product.compare_price.filter(|_| discounted).map(PriceDisplay::of),
            percent_off: discounted.then_some(product.percent_off),
            badges: product.badges.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductDetailView {
    #[serde(flatten)]
    pub card: ProductCard,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub images: Vec<String>,
    pub gallery_images: Vec<String>,
    pub certificates: Vec<ProductCertificate>,
    /// What "Add to cart" puts in the cart.
    pub cart_item: CartLineItem,
}

impl From<&ProductDetail> for ProductDetailView {
    fn from(detail: &ProductDetail) -> Self {
        let product = &detail.product;
        Self {
            card: ProductCard::from(product),
            description: product.description.clone(),
            short_description: product.short_description.clone(),
            images: product.images.clone(),
            gallery_images: product.gallery_images.clone(),
            certificates: detail.certificates.clone(),
            cart_item: CartLineItem::from_product(product),
        }
    }
}
