use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("timeout {0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("{kind}: max_attempts must be at least 1")]
    NoAttempts { kind: &'static str },
    #[error("{kind}: backoff multiplier must be at least 1.0")]
    InvalidMultiplier { kind: &'static str },
    #[error("{kind}: max_delay_ms must not be less than base_delay_ms")]
    InvalidDelayBounds { kind: &'static str },
    #[error("{kind}: failure_rate_threshold must be in (0, 1]")]
    InvalidThreshold { kind: &'static str },
    #[error("{kind}: sliding_window_size must be greater than zero")]
    EmptyWindow { kind: &'static str },
    #[error("{kind}: minimum_calls must be between 1 and sliding_window_size")]
    InvalidMinimumCalls { kind: &'static str },
    #[error("{kind}: half_open_probes must be greater than zero")]
    NoProbes { kind: &'static str },
    #[error("{kind}: cache max_entries must be greater than zero")]
    EmptyCache { kind: &'static str },
    #[error("{kind}: cache ttl_secs and poison_ttl_secs must be greater than zero")]
    ZeroTtl { kind: &'static str },
}

/// Upstream catalog configuration.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    pub base_url: Url,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default = "CallPolicy::similar_ids")]
    pub similar_ids: CallPolicy,
    #[serde(default = "CallPolicy::product_detail")]
    pub product_detail: CallPolicy,
}

impl Config {
    pub fn new(base_url: Url) -> Self {
        Config {
            base_url,
            timeouts: Timeouts::default(),
            similar_ids: CallPolicy::similar_ids(),
            product_detail: CallPolicy::product_detail(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.timeouts.validate()?;
        self.similar_ids.validate("similar_ids")?;
        self.product_detail.validate("product_detail")?;
        Ok(())
    }

    /// Longest a single detail call can take when every attempt runs into the
    /// response timeout: all attempts plus every backoff in between.
    pub fn detail_call_budget(&self) -> Duration {
        self.product_detail.retry.worst_case(self.timeouts.response())
    }
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    pub connect_ms: u64,
    pub read_ms: u64,
    pub write_ms: u64,
    pub response_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect_ms: 2000,
            read_ms: 2000,
            write_ms: 2000,
            response_ms: 2000,
        }
    }
}

impl Timeouts {
    fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("connect_ms", self.connect_ms),
            ("read_ms", self.read_ms),
            ("write_ms", self.write_ms),
            ("response_ms", self.response_ms),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroTimeout(name));
            }
        }
        Ok(())
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn response(&self) -> Duration {
        Duration::from_millis(self.response_ms)
    }
}

/// Retry, breaker and cache settings for one kind of upstream call.
///
/// An omitted policy falls back to the defaults of its call kind. Within a
/// policy, `retry` is required while `breaker` and `cache` have generic defaults.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct CallPolicy {
    pub retry: RetryPolicy,
    #[serde(default)]
    pub breaker: BreakerPolicy,
    #[serde(default)]
    pub cache: CachePolicy,
}

impl CallPolicy {
    pub fn similar_ids() -> Self {
        CallPolicy {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 500,
                multiplier: 2.0,
                max_delay_ms: 2000,
                retry_upstream_errors: false,
                retry_not_found: false,
            },
            breaker: BreakerPolicy::default(),
            cache: CachePolicy::default(),
        }
    }

    pub fn product_detail() -> Self {
        CallPolicy {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 2000,
                multiplier: 2.0,
                max_delay_ms: 5000,
                retry_upstream_errors: true,
                retry_not_found: false,
            },
            breaker: BreakerPolicy::default(),
            cache: CachePolicy::default(),
        }
    }

    fn validate(&self, kind: &'static str) -> Result<(), ValidationError> {
        self.retry.validate(kind)?;
        self.breaker.validate(kind)?;
        self.cache.validate(kind)?;
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    #[serde(default)]
    pub retry_upstream_errors: bool,
    #[serde(default)]
    pub retry_not_found: bool,
}

impl RetryPolicy {
    fn validate(&self, kind: &'static str) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::NoAttempts { kind });
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ValidationError::InvalidMultiplier { kind });
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ValidationError::InvalidDelayBounds { kind });
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BreakerPolicy {
    pub failure_rate_threshold: f64,
    pub sliding_window_size: usize,
    pub minimum_calls: usize,
    pub open_cooldown_ms: u64,
    pub half_open_probes: u32,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        BreakerPolicy {
            failure_rate_threshold: 0.5,
            sliding_window_size: 10,
            minimum_calls: 5,
            open_cooldown_ms: 10_000,
            half_open_probes: 3,
        }
    }
}

impl BreakerPolicy {
    fn validate(&self, kind: &'static str) -> Result<(), ValidationError> {
        if self.failure_rate_threshold.is_nan()
            || self.failure_rate_threshold <= 0.0
            || self.failure_rate_threshold > 1.0
        {
            return Err(ValidationError::InvalidThreshold { kind });
        }
        if self.sliding_window_size == 0 {
            return Err(ValidationError::EmptyWindow { kind });
        }
        if self.minimum_calls == 0 || self.minimum_calls > self.sliding_window_size {
            return Err(ValidationError::InvalidMinimumCalls { kind });
        }
        if self.half_open_probes == 0 {
            return Err(ValidationError::NoProbes { kind });
        }
        Ok(())
    }

    pub fn open_cooldown(&self) -> Duration {
        Duration::from_millis(self.open_cooldown_ms)
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct CachePolicy {
    pub max_entries: u64,
    /// Successful payloads never expire when unset.
    pub ttl_secs: Option<u64>,
    /// Lifetime of poison markers. Falls back to `ttl_secs` when unset.
    pub poison_ttl_secs: Option<u64>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            max_entries: 10_000,
            ttl_secs: None,
            poison_ttl_secs: Some(30),
        }
    }
}

impl CachePolicy {
    fn validate(&self, kind: &'static str) -> Result<(), ValidationError> {
        if self.max_entries == 0 {
            return Err(ValidationError::EmptyCache { kind });
        }
        if self.ttl_secs == Some(0) || self.poison_ttl_secs == Some(0) {
            return Err(ValidationError::ZeroTtl { kind });
        }
        Ok(())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    pub fn poison_ttl(&self) -> Option<Duration> {
        self.poison_ttl_secs.or(self.ttl_secs).map(Duration::from_secs)
    }
}
