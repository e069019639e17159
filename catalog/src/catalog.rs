use crate::circuit_breaker::CircuitState;
use crate::client::{CatalogClient, HttpCatalogClient};
use crate::config::Config;
use crate::errors::{CatalogError, SetupError};
use crate::resilience::{CallOutcome, ResilientCall};
use crate::types::{CallKind, ProductId, ProductRecord};
use std::sync::Arc;

/// Process-wide handle to the upstream catalog.
///
/// Cheap to clone. All clones share the same caches and breakers.
#[derive(Clone)]
pub struct ProductCatalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    client: Arc<dyn CatalogClient>,
    similar_ids: ResilientCall<Vec<ProductId>>,
    product_detail: ResilientCall<ProductRecord>,
}

impl ProductCatalog {
    pub fn new(client: Arc<dyn CatalogClient>, config: &Config) -> Self {
        ProductCatalog {
            inner: Arc::new(CatalogInner {
                client,
                similar_ids: ResilientCall::new(CallKind::SimilarIds, &config.similar_ids),
                product_detail: ResilientCall::new(
                    CallKind::ProductDetail,
                    &config.product_detail,
                ),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        config.validate()?;
        let client = HttpCatalogClient::new(&config.base_url, config.timeouts)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Ids similar to `id`, in upstream order. A degraded call yields an empty list.
    pub async fn similar_ids(&self, id: ProductId) -> Result<Vec<ProductId>, CatalogError> {
        let client = &self.inner.client;
        let outcome = self
            .inner
            .similar_ids
            .call(id, || client.similar_ids(id))
            .await?;

        Ok(match outcome {
            CallOutcome::Value(ids) => ids,
            CallOutcome::Degraded(_) => Vec::new(),
        })
    }

    /// Details of `id`. A degraded call yields `None`.
    pub async fn product_detail(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductRecord>, CatalogError> {
        let client = &self.inner.client;
        let outcome = self
            .inner
            .product_detail
            .call(id, || client.product_detail(id))
            .await?;

        Ok(match outcome {
            CallOutcome::Value(record) => Some(record),
            CallOutcome::Degraded(_) => None,
        })
    }

    pub fn breaker_state(&self, kind: CallKind) -> CircuitState {
        match kind {
            CallKind::SimilarIds => self.inner.similar_ids.breaker().state(),
            CallKind::ProductDetail => self.inner.product_detail.breaker().state(),
        }
    }
}
