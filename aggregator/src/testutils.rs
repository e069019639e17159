use async_trait::async_trait;
use bigdecimal::BigDecimal;
use catalog::ProductCatalog;
use catalog::client::CatalogClient;
use catalog::config::Config;
use catalog::errors::CatalogError;
use catalog::types::{ProductId, ProductRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Scripted answer of the fake catalog for one id.
#[derive(Clone)]
pub enum Reply<T> {
    Now(Result<T, CatalogError>),
    /// Answers after the given number of milliseconds.
    After(u64, Result<T, CatalogError>),
}

impl<T: Clone> Reply<T> {
    async fn play(&self) -> Result<T, CatalogError> {
        match self {
            Reply::Now(result) => result.clone(),
            Reply::After(delay_ms, result) => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                result.clone()
            }
        }
    }
}

/// In-memory `CatalogClient`. Ids without a scripted reply are not found.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    similar: HashMap<u64, Reply<Vec<ProductId>>>,
    details: HashMap<u64, Reply<ProductRecord>>,
    calls: Arc<Mutex<Vec<(&'static str, u64)>>>,
    completed: Arc<Mutex<Vec<(&'static str, u64)>>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn similar(mut self, id: u64, reply: Reply<Vec<ProductId>>) -> Self {
        self.similar.insert(id, reply);
        self
    }

    pub fn detail(mut self, id: u64, reply: Reply<ProductRecord>) -> Self {
        self.details.insert(id, reply);
        self
    }

    /// Number of upstream calls made so far for `kind` and `id`.
    pub fn calls(&self, kind: &str, id: u64) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(k, i)| *k == kind && *i == id)
            .count()
    }

    /// Number of upstream calls that ran to completion, whatever their result.
    pub fn completed(&self) -> usize {
        self.completed.lock().len()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn similar_ids(&self, id: ProductId) -> Result<Vec<ProductId>, CatalogError> {
        self.calls.lock().push(("similar_ids", id.get()));
        let result = match self.similar.get(&id.get()) {
            Some(reply) => reply.play().await,
            None => Err(CatalogError::NotFound(id)),
        };
        self.completed.lock().push(("similar_ids", id.get()));
        result
    }

    async fn product_detail(&self, id: ProductId) -> Result<ProductRecord, CatalogError> {
        self.calls.lock().push(("product_detail", id.get()));
        let result = match self.details.get(&id.get()) {
            Some(reply) => reply.play().await,
            None => Err(CatalogError::NotFound(id)),
        };
        self.completed.lock().push(("product_detail", id.get()));
        result
    }
}

pub fn ids(raw: &[u64]) -> Vec<ProductId> {
    raw.iter().copied().map(ProductId::new).collect()
}

pub fn record(id: u64) -> ProductRecord {
    ProductRecord {
        id: ProductId::new(id),
        name: Some(format!("Product {id}")),
        price: Some(BigDecimal::from_str("10.50").unwrap()),
        availability: Some(true),
    }
}

/// Catalog config with short backoffs, pointing nowhere.
pub fn test_catalog_config() -> Config {
    let mut config = Config::new(url::Url::parse("http://127.0.0.1:1").unwrap());
    for policy in [&mut config.similar_ids, &mut config.product_detail] {
        policy.retry.base_delay_ms = 10;
        policy.retry.max_delay_ms = 20;
    }
    config
}

pub fn catalog_with(fake: FakeCatalog) -> ProductCatalog {
    ProductCatalog::new(Arc::new(fake), &test_catalog_config())
}
