use crate::config::Timeouts;
use crate::errors::CatalogError;
use crate::types::{ProductId, ProductRecord};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Signed};
use serde::Deserialize;
use std::str::FromStr;
use url::Url;

/// The two calls the upstream catalog offers. Each is a single network round trip
/// with no retries, caching or breaker of its own.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn similar_ids(&self, id: ProductId) -> Result<Vec<ProductId>, CatalogError>;

    async fn product_detail(&self, id: ProductId) -> Result<ProductRecord, CatalogError>;
}

#[derive(Deserialize)]
struct ProductPayload {
    id: Option<ProductId>,
    name: Option<String>,
    price: Option<serde_json::Number>,
    availability: Option<bool>,
}

impl ProductPayload {
    fn into_record(self, requested: ProductId) -> Result<ProductRecord, CatalogError> {
        let price = match self.price {
            Some(number) => {
                let price = BigDecimal::from_str(&number.to_string()).map_err(|e| {
                    CatalogError::InvalidPayload {
                        id: requested,
                        reason: format!("price {number} is not a decimal: {e}"),
                    }
                })?;
                if price.is_negative() {
                    return Err(CatalogError::InvalidPayload {
                        id: requested,
                        reason: format!("negative price {price}"),
                    });
                }
                Some(price)
            }
            None => None,
        };

        Ok(ProductRecord {
            id: self.id.unwrap_or(requested),
            name: self.name,
            price,
            availability: self.availability,
        })
    }
}

/// `CatalogClient` over HTTP.
///
/// - `GET {base_url}/product/{id}/similarids` returns an array of ids.
/// - `GET {base_url}/product/{id}` returns a product.
///
/// Any 4xx is a not-found answer, any other non-2xx is an upstream error.
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    timeouts: Timeouts,
}

impl HttpCatalogClient {
    pub fn new(base_url: &Url, timeouts: Timeouts) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .timeout(timeouts.response())
            .build()?;

        Ok(HttpCatalogClient {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            timeouts,
        })
    }

    async fn get_json<T>(&self, id: ProductId, path: &str) -> Result<T, CatalogError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(product_id = %id, url = %url, "calling upstream catalog");

        // The write timeout bounds everything up to the response headers.
        let response =
            match tokio::time::timeout(self.timeouts.write(), self.client.get(&url).send()).await
            {
                Ok(response) => response.map_err(|e| map_reqwest_error(id, e))?,
                Err(_) => return Err(CatalogError::Timeout(id)),
            };

        let status = response.status();
        if status.is_client_error() {
            return Err(CatalogError::NotFound(id));
        }
        if !status.is_success() {
            return Err(CatalogError::UpstreamError {
                id,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(id, e))?;
        serde_json::from_slice(&body).map_err(|e| CatalogError::InvalidPayload {
            id,
            reason: e.to_string(),
        })
    }
}

fn map_reqwest_error(id: ProductId, err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout(id)
    } else {
        CatalogError::Transport {
            id,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn similar_ids(&self, id: ProductId) -> Result<Vec<ProductId>, CatalogError> {
        self.get_json(id, &format!("/product/{id}/similarids")).await
    }

    async fn product_detail(&self, id: ProductId) -> Result<ProductRecord, CatalogError> {
        let payload: ProductPayload = self.get_json(id, &format!("/product/{id}")).await?;
        payload.into_record(id)
    }
}
