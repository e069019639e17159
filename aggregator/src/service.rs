use crate::errors::{AggregatorError, Result};
use crate::executor::FanOutExecutor;
use catalog::ProductCatalog;
use catalog::errors::CatalogError;
use catalog::types::{ProductId, ProductRecord};

/// How the similar-id lookup of a request ended.
#[derive(Debug)]
enum ListOutcome {
    /// Detail lookups go ahead for these ids, possibly none.
    FanOut(Vec<ProductId>),
    /// The source product is unknown. The response is an empty list.
    Empty,
    /// No similar-id list could be established.
    Failed(AggregatorError),
}

/// Two-stage lookup behind both the REST and RPC endpoints.
///
/// The similar-id list is fetched once, then every listed product is looked up
/// concurrently. Only a failure of the list call itself fails the request;
/// products whose detail lookup fails are left out of the result.
#[derive(Clone)]
pub struct SimilarProducts {
    catalog: ProductCatalog,
    executor: FanOutExecutor,
}

impl SimilarProducts {
    pub fn new(catalog: ProductCatalog, executor: FanOutExecutor) -> Self {
        Self { catalog, executor }
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub async fn get_similar_products(&self, id: ProductId) -> Result<Vec<ProductRecord>> {
        match self.list(id).await {
            ListOutcome::FanOut(ids) => Ok(self.executor.execute(&ids).await),
            ListOutcome::Empty => Ok(Vec::new()),
            ListOutcome::Failed(e) => Err(e),
        }
    }

    async fn list(&self, id: ProductId) -> ListOutcome {
        match self.catalog.similar_ids(id).await {
            Ok(ids) => ListOutcome::FanOut(ids),
            Err(CatalogError::NotFound(_)) => {
                tracing::debug!(product_id = %id, "Source product not found");
                ListOutcome::Empty
            }
            Err(CatalogError::UpstreamError { status, .. }) => {
                tracing::error!(product_id = %id, status, "Similar-id lookup failed");
                ListOutcome::Failed(AggregatorError::Upstream { id, status })
            }
            Err(CatalogError::InvalidPayload { reason, .. }) => {
                tracing::error!(product_id = %id, reason = %reason, "Similar-id payload is invalid");
                ListOutcome::Failed(AggregatorError::UpstreamPayload { id, reason })
            }
            // Transient failures come back degraded rather than as errors.
            Err(e) => {
                tracing::warn!(product_id = %id, error = %e, "Similar-id lookup degraded");
                ListOutcome::Empty
            }
        }
    }
}
