use bigdecimal::BigDecimal;
use catalog::types::ProductRecord;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

/// Product as rendered to callers of both the REST and RPC endpoints.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductDto {
    pub id: String,
    pub name: String,
    #[serde(serialize_with = "serialize_decimal")]
    pub price: BigDecimal,
    pub availability: bool,
}

impl From<&ProductRecord> for ProductDto {
    fn from(record: &ProductRecord) -> Self {
        ProductDto {
            id: record.id.to_string(),
            name: record.name.clone().unwrap_or_default(),
            price: record.price.clone().unwrap_or_default(),
            availability: record.availability.unwrap_or(false),
        }
    }
}

// Written as a JSON number with every digit of the decimal kept.
fn serialize_decimal<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let raw = RawValue::from_string(value.to_string()).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

/// Body of a successful RPC response.
#[derive(Serialize, Debug, PartialEq)]
pub struct ProductResponse {
    pub products: Vec<ProductDto>,
}

pub fn project(records: &[ProductRecord]) -> Vec<ProductDto> {
    records.iter().map(ProductDto::from).collect()
}
