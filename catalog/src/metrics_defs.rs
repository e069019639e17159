//! Metrics definitions for the catalog.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "catalog.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of lookups served from the response cache, tagged by kind",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "catalog.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of lookups that missed the response cache, tagged by kind",
};

pub const CACHE_POISONED: MetricDef = MetricDef {
    name: "catalog.cache.poisoned",
    metric_type: MetricType::Counter,
    description: "Number of keys poisoned after exhausting retries on transient failures",
};

pub const UPSTREAM_CALL_DURATION: MetricDef = MetricDef {
    name: "catalog.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single upstream attempt in seconds, tagged by kind and outcome",
};

pub const UPSTREAM_RETRY: MetricDef = MetricDef {
    name: "catalog.upstream.retry",
    metric_type: MetricType::Counter,
    description: "Number of retried upstream attempts, tagged by kind",
};

pub const FALLBACK: MetricDef = MetricDef {
    name: "catalog.fallback",
    metric_type: MetricType::Counter,
    description: "Number of calls degraded to an empty result, tagged by kind and reason",
};

pub const BREAKER_OPENED: MetricDef = MetricDef {
    name: "catalog.breaker.opened",
    metric_type: MetricType::Counter,
    description: "Number of times a circuit breaker opened, tagged by kind",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    CACHE_POISONED,
    UPSTREAM_CALL_DURATION,
    UPSTREAM_RETRY,
    FALLBACK,
    BREAKER_OPENED,
];
