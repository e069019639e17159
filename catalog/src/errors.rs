use crate::config::ValidationError;
use crate::types::{CallKind, ProductId};

/// Failure of a single upstream call, as seen by callers of the catalog.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(ProductId),
    #[error("upstream returned status {status} for product {id}")]
    UpstreamError { id: ProductId, status: u16 },
    #[error("upstream timed out for product {0}")]
    Timeout(ProductId),
    #[error("transport error for product {id}: {reason}")]
    Transport { id: ProductId, reason: String },
    #[error("invalid upstream payload for product {id}: {reason}")]
    InvalidPayload { id: ProductId, reason: String },
    #[error("circuit open for {kind} calls, product {id} skipped")]
    CircuitOpen { kind: CallKind, id: ProductId },
    #[error("product {0} is poisoned after a recent transient failure")]
    Poisoned(ProductId),
}

impl CatalogError {
    pub fn product_id(&self) -> ProductId {
        match self {
            CatalogError::NotFound(id)
            | CatalogError::Timeout(id)
            | CatalogError::Poisoned(id) => *id,
            CatalogError::UpstreamError { id, .. }
            | CatalogError::Transport { id, .. }
            | CatalogError::InvalidPayload { id, .. }
            | CatalogError::CircuitOpen { id, .. } => *id,
        }
    }

    /// Timeouts and transport failures. These are the only errors that poison a key.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Timeout(_) | CatalogError::Transport { .. }
        )
    }

    /// Whether the outcome counts against the circuit breaker. A not-found answer is a
    /// healthy upstream saying no, so it does not.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            CatalogError::Timeout(_)
                | CatalogError::Transport { .. }
                | CatalogError::UpstreamError { .. }
                | CatalogError::InvalidPayload { .. }
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "not_found",
            CatalogError::UpstreamError { .. } => "upstream_error",
            CatalogError::Timeout(_) => "timeout",
            CatalogError::Transport { .. } => "transport",
            CatalogError::InvalidPayload { .. } => "invalid_payload",
            CatalogError::CircuitOpen { .. } => "circuit_open",
            CatalogError::Poisoned(_) => "poisoned",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("invalid catalog config: {0}")]
    Validation(#[from] ValidationError),
}
