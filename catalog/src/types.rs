use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Canonical form of a catalog product identifier.
///
/// Externally ids are strings. Only plain decimal digits without leading zeros are
/// accepted, so every accepted string maps to exactly one `ProductId` and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductId(u64);

impl ProductId {
    pub const fn new(id: u64) -> Self {
        ProductId(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidProductId {
    #[error("product id is empty")]
    Empty,
    #[error("product id must contain only ascii digits")]
    NotNumeric,
    #[error("product id must not have leading zeros")]
    LeadingZero,
    #[error("product id is out of range")]
    OutOfRange,
}

impl FromStr for ProductId {
    type Err = InvalidProductId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidProductId::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidProductId::NotNumeric);
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(InvalidProductId::LeadingZero);
        }
        s.parse::<u64>()
            .map(ProductId)
            .map_err(|_| InvalidProductId::OutOfRange)
    }
}

// Upstream payloads carry ids either as JSON numbers or as strings.
impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(id) => Ok(ProductId(id)),
            Repr::Text(id) => id.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// The two kinds of upstream calls. Cache entries and breaker state are kept per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    SimilarIds,
    ProductDetail,
}

impl CallKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CallKind::SimilarIds => "similar_ids",
            CallKind::ProductDetail => "product_detail",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product details as returned by the catalog.
///
/// Fields the upstream did not send stay `None`; the response projector decides
/// how they are rendered. `price`, when present, is never negative.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: Option<String>,
    pub price: Option<BigDecimal>,
    pub availability: Option<bool>,
}
