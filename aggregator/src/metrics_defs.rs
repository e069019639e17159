use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, endpoint.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const PRODUCTS_DROPPED: MetricDef = MetricDef {
    name: "fanout.products_dropped",
    metric_type: MetricType::Counter,
    description: "Number of similar products dropped from responses because their detail lookup failed",
};

pub const FANOUT_SIZE: MetricDef = MetricDef {
    name: "fanout.size",
    metric_type: MetricType::Histogram,
    description: "Number of detail lookups issued per request",
};

pub const REQUESTS_RATE_LIMITED: MetricDef = MetricDef {
    name: "requests.rate_limited",
    metric_type: MetricType::Counter,
    description: "Number of requests rejected by the inbound rate limit",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    PRODUCTS_DROPPED,
    FANOUT_SIZE,
    REQUESTS_RATE_LIMITED,
];
