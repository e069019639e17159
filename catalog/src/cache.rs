// Process-wide read-through cache for upstream responses. A key holds either the
// payload of a successful call or a poison marker left behind by a call that
// exhausted its retries on transient failures.
use crate::config::CachePolicy;
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS, CACHE_POISONED};
use crate::types::{CallKind, ProductId};
use moka::Expiry;
use moka::sync::Cache;
use shared::counter;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq)]
pub enum CacheEntry<T> {
    Value(T),
    Poisoned,
}

struct EntryExpiry {
    value_ttl: Option<Duration>,
    poison_ttl: Option<Duration>,
}

impl<T> Expiry<ProductId, CacheEntry<T>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &ProductId,
        value: &CacheEntry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        match value {
            CacheEntry::Value(_) => self.value_ttl,
            CacheEntry::Poisoned => self.poison_ttl,
        }
    }

    // An overwrite restarts the clock with the lifetime of the new entry.
    fn expire_after_update(
        &self,
        key: &ProductId,
        value: &CacheEntry<T>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.expire_after_create(key, value, updated_at)
    }
}

pub struct ResponseCache<T> {
    kind: CallKind,
    cache: Cache<ProductId, CacheEntry<T>>,
}

impl<T> ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(kind: CallKind, policy: &CachePolicy) -> Self {
        let cache = Cache::builder()
            .max_capacity(policy.max_entries)
            .expire_after(EntryExpiry {
                value_ttl: policy.ttl(),
                poison_ttl: policy.poison_ttl(),
            })
            .build();

        ResponseCache { kind, cache }
    }

    pub fn get(&self, id: ProductId) -> Option<CacheEntry<T>> {
        let entry = self.cache.get(&id);
        let metric_def = if entry.is_some() { CACHE_HIT } else { CACHE_MISS };
        counter!(metric_def, "kind" => self.kind.as_str()).increment(1);
        entry
    }

    pub fn insert(&self, id: ProductId, value: T) {
        self.cache.insert(id, CacheEntry::Value(value));
    }

    pub fn poison(&self, id: ProductId) {
        counter!(CACHE_POISONED, "kind" => self.kind.as_str()).increment(1);
        self.cache.insert(id, CacheEntry::Poisoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache() {
        let cache = ResponseCache::new(CallKind::SimilarIds, &CachePolicy::default());
        let id = ProductId::new(1);

        assert_eq!(cache.get(id), None);
        cache.insert(id, vec![ProductId::new(2)]);
        assert_eq!(cache.get(id), Some(CacheEntry::Value(vec![ProductId::new(2)])));

        // Last writer wins.
        cache.poison(id);
        assert_eq!(cache.get(id), Some(CacheEntry::Poisoned));
    }

    #[test]
    fn test_cache_expiry() {
        let policy = CachePolicy {
            max_entries: 10,
            ttl_secs: Some(1),
            poison_ttl_secs: None,
        };
        let cache = ResponseCache::new(CallKind::ProductDetail, &policy);
        cache.insert(ProductId::new(1), "record");
        assert!(cache.get(ProductId::new(1)).is_some());

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(cache.get(ProductId::new(1)), None);
    }

    #[test]
    fn test_poison_expires_before_values() {
        let policy = CachePolicy {
            max_entries: 10,
            ttl_secs: None,
            poison_ttl_secs: Some(1),
        };
        let cache = ResponseCache::new(CallKind::SimilarIds, &policy);
        cache.insert(ProductId::new(1), vec![ProductId::new(2)]);
        cache.poison(ProductId::new(3));
        assert_eq!(cache.get(ProductId::new(3)), Some(CacheEntry::Poisoned));

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(cache.get(ProductId::new(3)), None);
        assert_eq!(
            cache.get(ProductId::new(1)),
            Some(CacheEntry::Value(vec![ProductId::new(2)]))
        );
    }
}
