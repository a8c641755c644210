//! Value Objects for the storefront

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed BGN per EUR rate used for every secondary-currency display.
pub const BGN_PER_EUR: Decimal = Decimal::from_parts(195_583, 0, 0, false, 5);

/// Largest unit price accepted from a row or a client (1 000 000.00).
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 2);

/// Normalises a unit price: two decimals, and zero for negative or absurd input.
pub fn sanitize_price(price: Decimal) -> Decimal {
    if price.is_sign_negative() || price > MAX_UNIT_PRICE { Decimal::ZERO } else { price.round_dp(2) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Bgn,
    Eur,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self { Self::Bgn => "BGN", Self::Eur => "EUR" }
    }

    pub fn symbol(self) -> &'static str {
        match self { Self::Bgn => "лв.", Self::Eur => "€" }
    }
}

/// Slug value object: lowercase ASCII letters, digits and single inner hyphens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn parse(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into();
        if value.is_empty() { return Err(SlugError::Empty); }
        if value.len() > 200 { return Err(SlugError::TooLong); }
        if !value.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
            return Err(SlugError::InvalidCharacter);
        }
        if value.starts_with('-') || value.ends_with('-') || value.contains("--") {
            return Err(SlugError::MisplacedHyphen);
        }
        Ok(Self(value))
    }

    /// `base-n`; `n <= 1` returns the base unchanged.
    pub fn with_suffix(&self, n: u32) -> Self {
        if n <= 1 { self.clone() } else { Self(format!("{}-{n}", self.0)) }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self { slug.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SlugError { Empty, TooLong, InvalidCharacter, MisplacedHyphen }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "slug empty"),
            Self::TooLong => write!(f, "slug too long"),
            Self::InvalidCharacter => write!(f, "slug may only contain a-z, 0-9 and '-'"),
            Self::MisplacedHyphen => write!(f, "slug has a leading, trailing or doubled hyphen"),
        }
    }
}

/// Money value object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: Currency }

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self { Self { amount, currency } }
    pub fn bgn(amount: Decimal) -> Self { Self::new(amount, Currency::Bgn) }
    pub fn zero(currency: Currency) -> Self { Self::new(Decimal::ZERO, currency) }

    /// Coerces a raw row price into money. Non-finite and negative input
    /// become zero so partially loaded product data never poisons totals.
    pub fn from_f64_lossy(value: f64, currency: Currency) -> Self {
        let amount = if value.is_finite() && value > 0.0 {
            Decimal::from_f64(value).map(sanitize_price).unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        Self::new(amount, currency)
    }

    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> Currency { self.currency }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, self.currency))
    }

    /// Converts a BGN amount to EUR at the fixed rate; EUR amounts pass through.
    pub fn to_eur(&self) -> Money {
        match self.currency {
            Currency::Eur => *self,
            Currency::Bgn => Money::new((self.amount / BGN_PER_EUR).round_dp(2), Currency::Eur),
        }
    }
}

impl Default for Money { fn default() -> Self { Self::zero(Currency::Bgn) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount.round_dp(2), self.currency.symbol())
    }
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Line quantity, always within `1..=MAX_LINE_QUANTITY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);
    pub const MAX: Quantity = Quantity(MAX_LINE_QUANTITY);

    pub fn new(value: i64) -> Self {
        Self(value.clamp(1, i64::from(MAX_LINE_QUANTITY)) as u32)
    }

    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0).min(MAX_LINE_QUANTITY)) }
}

impl Default for Quantity { fn default() -> Self { Self::ONE } }
