//! Cache, circuit breaker and retry composed around one kind of upstream call.
//!
//! Every call goes through the same steps: a cache read, the breaker gate, the
//! attempt itself, and on failure either a backoff and another attempt or a
//! final decision. Transient failures that exhaust their retries degrade to an
//! empty result and poison the key so later calls skip the network until the
//! entry is evicted. Definitive failures are returned to the caller and are not
//! cached.

use crate::cache::{CacheEntry, ResponseCache};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{CallPolicy, RetryPolicy};
use crate::errors::CatalogError;
use crate::metrics_defs::{FALLBACK, UPSTREAM_CALL_DURATION, UPSTREAM_RETRY};
use crate::types::{CallKind, ProductId};
use shared::{counter, histogram};
use std::future::Future;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Value(T),
    /// The call was answered by the fallback. The error says why.
    Degraded(CatalogError),
}

pub struct ResilientCall<T> {
    kind: CallKind,
    cache: ResponseCache<T>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl<T> ResilientCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(kind: CallKind, policy: &CallPolicy) -> Self {
        ResilientCall {
            kind,
            cache: ResponseCache::new(kind, &policy.cache),
            breaker: CircuitBreaker::new(kind, policy.breaker.clone()),
            retry: policy.retry.clone(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `op` for `id` under the cache, breaker and retry policy of this call kind.
    ///
    /// `op` is invoked once per attempt. The successful payload is written to the cache
    /// before returning.
    pub async fn call<F, Fut>(&self, id: ProductId, op: F) -> Result<CallOutcome<T>, CatalogError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        match self.cache.get(id) {
            Some(CacheEntry::Value(value)) => {
                tracing::debug!(kind = %self.kind, product_id = %id, "served from cache");
                return Ok(CallOutcome::Value(value));
            }
            Some(CacheEntry::Poisoned) => {
                return Ok(self.degrade(CatalogError::Poisoned(id)));
            }
            None => {}
        }

        let mut attempt: u32 = 0;
        loop {
            let Some(permit) = self.breaker.try_acquire() else {
                return Ok(self.degrade(CatalogError::CircuitOpen {
                    kind: self.kind,
                    id,
                }));
            };

            attempt += 1;
            let started = Instant::now();
            let result = op().await;
            let outcome = match &result {
                Ok(_) => "ok",
                Err(err) => err.error_type(),
            };
            histogram!(
                UPSTREAM_CALL_DURATION,
                "kind" => self.kind.as_str(),
                "outcome" => outcome
            )
            .record(started.elapsed().as_secs_f64());

            let err = match result {
                Ok(value) => {
                    permit.success();
                    self.cache.insert(id, value.clone());
                    return Ok(CallOutcome::Value(value));
                }
                Err(err) => err,
            };

            if err.counts_as_failure() {
                permit.failure();
            } else {
                permit.success();
            }

            if attempt < self.retry.max_attempts && self.retry.should_retry(&err) {
                let delay = self.retry.delay_for(attempt - 1);
                tracing::debug!(
                    kind = %self.kind,
                    product_id = %id,
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "retrying upstream call"
                );
                counter!(UPSTREAM_RETRY, "kind" => self.kind.as_str()).increment(1);
                tokio::time::sleep(delay).await;
                continue;
            }

            if err.is_transient() {
                self.cache.poison(id);
                return Ok(self.degrade(err));
            }
            return Err(err);
        }
    }

    fn degrade(&self, err: CatalogError) -> CallOutcome<T> {
        tracing::warn!(
            kind = %self.kind,
            product_id = %err.product_id(),
            error = %err,
            "upstream call degraded to fallback"
        );
        counter!(
            FALLBACK,
            "kind" => self.kind.as_str(),
            "reason" => err.error_type()
        )
        .increment(1);
        CallOutcome::Degraded(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::config::BreakerPolicy;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Script {
        responses: Mutex<VecDeque<Result<u32, CatalogError>>>,
        calls: AtomicUsize,
    }

    impl Script {
        fn new(responses: Vec<Result<u32, CatalogError>>) -> Self {
            Script {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        async fn next(&self) -> Result<u32, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .expect("script exhausted")
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn detail_policy() -> CallPolicy {
        let mut policy = CallPolicy::product_detail();
        policy.retry.base_delay_ms = 100;
        policy.retry.max_delay_ms = 400;
        policy
    }

    const ID: ProductId = ProductId::new(3);

    #[tokio::test(start_paused = true)]
    async fn test_success_is_cached() {
        let call = ResilientCall::new(CallKind::ProductDetail, &detail_policy());
        let script = Script::new(vec![Ok(42)]);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Value(42))
        );
        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Value(42))
        );
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let call = ResilientCall::new(CallKind::ProductDetail, &detail_policy());
        let script = Script::new(vec![
            Err(CatalogError::Timeout(ID)),
            Err(CatalogError::UpstreamError { id: ID, status: 502 }),
            Ok(7),
        ]);

        let started = Instant::now();
        let outcome = call.call(ID, || script.next()).await;
        assert_eq!(outcome, Ok(CallOutcome::Value(7)));
        assert_eq!(script.calls(), 3);
        // 100ms then 200ms of backoff.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_timeouts_poison_the_key() {
        let call = ResilientCall::new(CallKind::ProductDetail, &detail_policy());
        let script = Script::new(vec![
            Err(CatalogError::Timeout(ID)),
            Err(CatalogError::Timeout(ID)),
            Err(CatalogError::Timeout(ID)),
        ]);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Degraded(CatalogError::Timeout(ID)))
        );
        assert_eq!(script.calls(), 3);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Degraded(CatalogError::Poisoned(ID)))
        );
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_definitive_failures_are_returned_and_not_cached() {
        let call = ResilientCall::new(CallKind::SimilarIds, &CallPolicy::similar_ids());
        let script = Script::new(vec![
            Err(CatalogError::UpstreamError { id: ID, status: 503 }),
            Err(CatalogError::NotFound(ID)),
            Ok(1),
        ]);

        // The list path does not retry upstream errors.
        assert_eq!(
            call.call(ID, || script.next()).await,
            Err(CatalogError::UpstreamError { id: ID, status: 503 })
        );
        assert_eq!(script.calls(), 1);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Err(CatalogError::NotFound(ID))
        );
        assert_eq!(script.calls(), 2);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Value(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_without_poisoning() {
        let mut policy = detail_policy();
        policy.retry.max_attempts = 1;
        policy.breaker = BreakerPolicy {
            failure_rate_threshold: 1.0,
            sliding_window_size: 2,
            minimum_calls: 2,
            open_cooldown_ms: 5000,
            half_open_probes: 1,
        };
        let call = ResilientCall::new(CallKind::ProductDetail, &policy);
        let script = Script::new(vec![
            Err(CatalogError::UpstreamError { id: ID, status: 500 }),
            Err(CatalogError::UpstreamError {
                id: ProductId::new(4),
                status: 500,
            }),
            Ok(9),
        ]);

        assert!(call.call(ID, || script.next()).await.is_err());
        assert!(call.call(ProductId::new(4), || script.next()).await.is_err());
        assert_eq!(call.breaker().state(), CircuitState::Open);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Degraded(CatalogError::CircuitOpen {
                kind: CallKind::ProductDetail,
                id: ID
            }))
        );
        assert_eq!(script.calls(), 2);

        // Not poisoned: once the breaker lets a probe through the key is fetched.
        tokio::time::advance(Duration::from_millis(5000)).await;
        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Value(9))
        );
        assert_eq!(call.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_between_attempts_degrades() {
        let mut policy = detail_policy();
        policy.breaker = BreakerPolicy {
            failure_rate_threshold: 1.0,
            sliding_window_size: 1,
            minimum_calls: 1,
            open_cooldown_ms: 60_000,
            half_open_probes: 1,
        };
        let call = ResilientCall::new(CallKind::ProductDetail, &policy);
        let script = Script::new(vec![Err(CatalogError::Timeout(ID))]);

        assert_eq!(
            call.call(ID, || script.next()).await,
            Ok(CallOutcome::Degraded(CatalogError::CircuitOpen {
                kind: CallKind::ProductDetail,
                id: ID
            }))
        );
        assert_eq!(script.calls(), 1);
    }
}
