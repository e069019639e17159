pub mod error;
pub mod rest;
pub mod rpc;

use crate::errors::AggregatorError;
use catalog::types::ProductId;

/// Parses an id received from a caller. Rejected ids never reach the catalog.
pub fn parse_product_id(raw: &str) -> Result<ProductId, AggregatorError> {
    raw.parse()
        .map_err(|reason| AggregatorError::InvalidProductId {
            input: raw.to_string(),
            reason,
        })
}
