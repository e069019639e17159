use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Fan-out request timeout cannot be 0")]
    ZeroFanoutTimeout,

    #[error(
        "Fan-out request timeout of {deadline_ms}ms must exceed the {budget_ms}ms a detail call may spend on retries"
    )]
    FanoutTimeoutTooShort { deadline_ms: u64, budget_ms: u64 },

    #[error("Rate limit capacity and refill rate must be greater than zero")]
    InvalidRateLimit,

    #[error("Catalog config error: {0}")]
    Catalog(#[from] catalog::config::ValidationError),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener serving the REST and RPC endpoints
    pub listener: Listener,
    /// Listener serving the health and readiness endpoints
    pub admin_listener: Listener,
    /// Upstream catalog and the resilience policy of its calls
    pub catalog: catalog::config::Config,
    /// Bounds on the detail fan-out of a single request
    #[serde(default)]
    pub fanout: FanoutConfig,
    /// Inbound rate limit. Requests are not limited when unset.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.catalog.validate()?;
        self.fanout.validate(self.catalog.detail_call_budget())?;
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        Ok(())
    }

    /// Deadline of the detail fan-out. Unless configured, it leaves every detail
    /// call enough time to use up its retries.
    pub fn fanout_deadline(&self) -> Duration {
        match self.fanout.request_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.catalog.detail_call_budget() + DERIVED_DEADLINE_SLACK,
        }
    }
}

const DERIVED_DEADLINE_SLACK: Duration = Duration::from_secs(1);

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FanoutConfig {
    /// Deadline for all detail calls of one request. Ids still pending when it
    /// passes are dropped from the response. Derived from the detail call
    /// policy when unset.
    pub request_timeout_ms: Option<u64>,
}

impl FanoutConfig {
    // A deadline inside the retry budget aborts calls before they can poison
    // their key, so every later request retries the same failing id.
    fn validate(&self, detail_budget: Duration) -> Result<(), ValidationError> {
        let Some(deadline_ms) = self.request_timeout_ms else {
            return Ok(());
        };
        if deadline_ms == 0 {
            return Err(ValidationError::ZeroFanoutTimeout);
        }
        let budget_ms = u64::try_from(detail_budget.as_millis()).unwrap_or(u64::MAX);
        if deadline_ms <= budget_ms {
            return Err(ValidationError::FanoutTimeoutTooShort {
                deadline_ms,
                budget_ms,
            });
        }
        Ok(())
    }
}

/// Token bucket applied to every inbound request before routing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Maximum burst size
    pub capacity: u32,
    /// Tokens added per second
    pub refill_per_sec: u32,
}

impl RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 || self.refill_per_sec == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 5000
admin_listener:
    host: "127.0.0.1"
    port: 5001
catalog:
    base_url: "http://localhost:3001"
    timeouts:
        connect_ms: 1000
        response_ms: 3000
fanout:
    request_timeout_ms: 20000
rate_limit:
    capacity: 100
    refill_per_sec: 50
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.admin_listener.host, "127.0.0.1");
        assert_eq!(config.catalog.timeouts.connect_ms, 1000);
        assert_eq!(config.catalog.timeouts.read_ms, 2000);
        assert_eq!(config.fanout_deadline(), Duration::from_secs(20));
        assert_eq!(
            config.rate_limit,
            Some(RateLimitConfig {
                capacity: 100,
                refill_per_sec: 50
            })
        );
    }

    #[test]
    fn test_optional_sections() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 5000
admin_listener:
    host: "127.0.0.1"
    port: 5001
catalog:
    base_url: "http://localhost:3001"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.fanout, FanoutConfig::default());
        assert_eq!(config.fanout_deadline(), Duration::from_secs(13));
        assert_eq!(config.rate_limit, None);
    }

    #[test]
    fn test_validation_errors() {
        let base_config = Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 5001,
            },
            catalog: catalog::config::Config::new(
                url::Url::parse("http://localhost:3001").unwrap(),
            ),
            fanout: FanoutConfig::default(),
            rate_limit: None,
        };

        let mut config = base_config.clone();
        config.admin_listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config.clone();
        config.fanout.request_timeout_ms = Some(0);
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::ZeroFanoutTimeout
        ));

        // Default detail policy needs 12s to exhaust its retries.
        let mut config = base_config.clone();
        config.fanout.request_timeout_ms = Some(10_000);
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::FanoutTimeoutTooShort {
                deadline_ms: 10_000,
                budget_ms: 12_000
            }
        ));

        let mut config = base_config.clone();
        config.fanout.request_timeout_ms = Some(12_001);
        assert!(config.validate().is_ok());

        let mut config = base_config.clone();
        config.rate_limit = Some(RateLimitConfig {
            capacity: 0,
            refill_per_sec: 10,
        });
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidRateLimit
        ));

        let mut config = base_config;
        config.catalog.timeouts.connect_ms = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::Catalog(_)
        ));
    }
}
