//! Concurrent detail lookups for one request.

use crate::metrics_defs::{FANOUT_SIZE, PRODUCTS_DROPPED};
use catalog::ProductCatalog;
use catalog::errors::CatalogError;
use catalog::types::{ProductId, ProductRecord};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;

/// Issues one detail call per id, all at once, and merges the results back into
/// the order of the ids.
///
/// A failed, degraded or panicked call drops its id and never affects the others.
/// Calls still running when the deadline passes are aborted and dropped as well.
/// Dropping the future returned by [`FanOutExecutor::execute`] drops the `JoinSet`,
/// which aborts every call still in flight.
#[derive(Clone)]
pub struct FanOutExecutor {
    catalog: ProductCatalog,
    timeout: Duration,
}

impl FanOutExecutor {
    pub fn new(catalog: ProductCatalog, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub async fn execute(&self, ids: &[ProductId]) -> Vec<ProductRecord> {
        histogram!(FANOUT_SIZE).record(ids.len() as f64);
        if ids.is_empty() {
            return Vec::new();
        }

        let mut join_set = JoinSet::new();
        let mut task_index = HashMap::with_capacity(ids.len());

        for (index, &id) in ids.iter().enumerate() {
            let catalog = self.catalog.clone();
            let abort_handle =
                join_set.spawn(async move { catalog.product_detail(id).await });
            task_index.insert(abort_handle.id(), index);
        }

        let mut slots: Vec<Option<ProductRecord>> = vec![None; ids.len()];

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                Some(join_result) = join_set.join_next_with_id() => {
                    let (task_id, result) = match join_result {
                        Ok(completed) => completed,
                        Err(e) => {
                            tracing::error!(error = %e, "Detail task failed");
                            task_index.remove(&e.id());
                            continue;
                        }
                    };
                    let Some(index) = task_index.remove(&task_id) else {
                        continue;
                    };
                    slots[index] = accept(ids[index], result);
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        pending = join_set.len(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Fan-out deadline reached, dropping pending products"
                    );
                    join_set.abort_all();
                    break;
                }
                else => break,
            }
        }

        let records: Vec<ProductRecord> = slots.into_iter().flatten().collect();
        let dropped = ids.len() - records.len();
        if dropped > 0 {
            counter!(PRODUCTS_DROPPED).increment(dropped as u64);
        }
        records
    }
}

fn accept(
    id: ProductId,
    result: Result<Option<ProductRecord>, CatalogError>,
) -> Option<ProductRecord> {
    match result {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            tracing::debug!(product_id = %id, "No record after fallback, dropping product");
            None
        }
        Err(e) => {
            tracing::debug!(product_id = %id, error = %e, "Detail lookup failed, dropping product");
            None
        }
    }
}
