//! Unary RPC surface, served as JSON over HTTP.
//!
//! `POST /api/0/product-rpc/get_similar_products` with `{"args": {"productId": "1"}}`
//! answers `{"products": [...]}`. Failures carry an [`RpcStatus`](crate::api::error::RpcStatus)
//! body instead.

use crate::api::parse_product_id;
use crate::errors::{AggregatorError, Result};
use crate::projector::{ProductResponse, project};
use crate::service::SimilarProducts;
use http::StatusCode;
use hyper::Response;
use hyper::body::Bytes;
use serde::Deserialize;
use shared::http::{ResponseBody, json_response};

pub const GET_SIMILAR_PRODUCTS_PATH: &str = "/api/0/product-rpc/get_similar_products";

#[derive(Deserialize, Debug)]
struct RpcRequest<T> {
    args: T,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GetSimilarProductsArgs {
    product_id: String,
}

pub async fn get_similar_products(
    service: &SimilarProducts,
    body: &Bytes,
) -> Result<Response<ResponseBody>> {
    let request: RpcRequest<GetSimilarProductsArgs> = serde_json::from_slice(body)
        .map_err(|e| AggregatorError::InvalidRequest(e.to_string()))?;
    let id = parse_product_id(&request.args.product_id)?;

    let records = service.get_similar_products(id).await?;
    let response = ProductResponse {
        products: project(&records),
    };
    Ok(json_response(StatusCode::OK, &response)?)
}
