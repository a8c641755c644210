//! Catalog products: raw rows as stored by the backend and the view model
//! every catalog page renders.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::decode::{decode_badges, decode_url_list, null_as_default, string_or_number};
use crate::domain::pricing::percent_off;
use crate::domain::value_objects::{Currency, Money};

/// Value of the `category` discriminator column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductCategory {
    Book,
    Bundle,
    Doll,
    Pillow,
    AudioStory,
    Spectacle,
    Other(String),
}

impl ProductCategory {
    pub fn from_db(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "book" | "books" => Self::Book,
            "bundle" | "bundles" | "set" => Self::Bundle,
            "doll" | "dolls" => Self::Doll,
            "pillow" | "pillows" => Self::Pillow,
            "audio" | "audio-story" | "audio_story" | "audio-stories" => Self::AudioStory,
            "spectacle" | "show" | "puppet-show" | "puppet_show" => Self::Spectacle,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn vertical(&self) -> Option<Vertical> {
        match self {
            Self::Book | Self::Bundle => Some(Vertical::Books),
            Self::Doll | Self::Pillow => Some(Vertical::Dolls),
            Self::AudioStory => Some(Vertical::AudioStories),
            Self::Spectacle => Some(Vertical::PuppetShows),
            Self::Other(_) => None,
        }
    }
}

/// The four storefront verticals, each with its own listing page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vertical {
    Books,
    Dolls,
    AudioStories,
    PuppetShows,
}

impl Vertical {
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Self::Books => &["book", "bundle"],
            Self::Dolls => &["doll", "pillow"],
            Self::AudioStories => &["audio-story"],
            Self::PuppetShows => &["spectacle"],
        }
    }

    pub fn listing_path(self) -> &'static str {
        match self {
            Self::Books => "/books",
            Self::Dolls => "/dolls",
            Self::AudioStories => "/audio-stories",
            Self::PuppetShows => "/puppet-shows",
        }
    }

    pub fn detail_path(self, slug: &str) -> String {
        format!("{}/{slug}", self.listing_path())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "books" => Some(Self::Books),
            "dolls" => Some(Self::Dolls),
            "audio-stories" => Some(Self::AudioStories),
            "puppet-shows" => Some(Self::PuppetShows),
            _ => None,
        }
    }
}

/// Product row as returned by the `products` table or the search procedure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default)]
    pub title_bg: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub compare_price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Option<Value>,
    #[serde(default)]
    pub badges: Option<Value>,
    #[serde(default)]
    pub gallery_images: Option<Value>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Catalog view model.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub percent_off: u32,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub gallery_images: Vec<String>,
    pub badges: Vec<String>,
    pub is_featured: bool,
}

impl Product {
    pub fn vertical(&self) -> Option<Vertical> { self.category.vertical() }

    pub fn detail_path(&self) -> String {
        match self.vertical() {
            Some(vertical) => vertical.detail_path(&self.slug),
            None => format!("/products/{}", self.slug),
        }
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let images = decode_url_list(row.images.as_ref());
        let image = row
            .image_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| images.first().cloned());
        let price = row.price.map(|raw| Money::from_f64_lossy(raw, Currency::Bgn).amount()).unwrap_or_default();
        let compare_price = row.compare_price.filter(|p| p.is_finite()).and_then(Decimal::from_f64).map(|d| d.round_dp(2));
        Self {
            title: row.title_bg.or(row.title).unwrap_or_default(),
            category: ProductCategory::from_db(row.category.as_deref().unwrap_or_default()),
            percent_off: percent_off(price, compare_price),
            price,
            compare_price,
            description: row.description,
            short_description: row.short_description,
            image,
            images,
            gallery_images: decode_url_list(row.gallery_images.as_ref()),
            badges: decode_badges(row.badges.as_ref()),
            is_featured: row.is_featured.unwrap_or(false),
            id: row.id,
            slug: row.slug,
        }
    }
}

/// Row of the `product_certificates` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductCertificate {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_maps_to_view_model() {
        let row: ProductRow = serde_json::from_value(json!({
            "id": 12,
            "slug": "babo-razkazhi-ni",
            "title_bg": "Бабо, разкажи ни!",
            "category": "book",
            "price": 49.9,
            "compare_price": 59.9,
            "images": "[{\"url\":\"https://cdn/1.jpg\"},\"https://cdn/2.jpg\"]",
            "badges": [{"label": "Хит"}],
            "gallery_images": null,
            "is_featured": true
        }))
        .unwrap();
        let product = Product::from(row);
        assert_eq!(product.id, "12");
        assert_eq!(product.title, "Бабо, разкажи ни!");
        assert_eq!(product.category, ProductCategory::Book);
        assert_eq!(product.price, Decimal::new(4990, 2));
        assert_eq!(product.percent_off, 17);
        assert_eq!(product.image.as_deref(), Some("https://cdn/1.jpg"));
        assert_eq!(product.images.len(), 2);
        assert_eq!(product.badges, vec!["Хит"]);
        assert!(product.gallery_images.is_empty());
        assert_eq!(product.detail_path(), "/books/babo-razkazhi-ni");
    }

    #[test]
    fn test_partial_row_uses_safe_defaults() {
        let row: ProductRow = serde_json::from_value(json!({"id": "a1", "slug": "x"})).unwrap();
        let product = Product::from(row);
        assert_eq!(product.price, Decimal::ZERO);
        assert_eq!(product.percent_off, 0);
        assert_eq!(product.category, ProductCategory::Other(String::new()));
        assert_eq!(product.detail_path(), "/products/x");
    }

    #[test]
    fn test_out_of_range_prices_read_as_zero() {
        let negative: ProductRow = serde_json::from_value(json!({"id": 1, "slug": "a", "price": -5.0})).unwrap();
        assert_eq!(Product::from(negative).price, Decimal::ZERO);
        let huge: ProductRow = serde_json::from_value(json!({"id": 2, "slug": "b", "price": 1e20})).unwrap();
        assert_eq!(Product::from(huge).price, Decimal::ZERO);
        let odd: ProductRow = serde_json::from_value(json!({"id": 3, "slug": "c", "price": 12.345})).unwrap();
        assert_eq!(Product::from(odd).price, Decimal::new(1234, 2));
    }

    #[test]
    fn test_category_verticals() {
        assert_eq!(ProductCategory::from_db("Pillow").vertical(), Some(Vertical::Dolls));
        assert_eq!(ProductCategory::from_db("bundle").vertical(), Some(Vertical::Books));
        assert_eq!(ProductCategory::from_db("show").vertical(), Some(Vertical::PuppetShows));
        assert_eq!(ProductCategory::from_db("mug").vertical(), None);
        assert_eq!(Vertical::parse("audio-stories"), Some(Vertical::AudioStories));
    }
}
