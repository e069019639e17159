use catalog::types::{InvalidProductId, ProductId};
use http::StatusCode;
use thiserror::Error;

/// Result type alias for aggregator operations
pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;

/// Errors surfaced by the gateway, either for a single request or while starting up
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Invalid product id {input:?}: {reason}")]
    InvalidProductId {
        input: String,
        reason: InvalidProductId,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Upstream returned status {status} listing products similar to {id}")]
    Upstream { id: ProductId, status: u16 },

    #[error("Upstream returned an invalid similar-id list for {id}: {reason}")]
    UpstreamPayload { id: ProductId, reason: String },

    #[error("Too many requests")]
    RateLimited,

    #[error("No route matched for request")]
    NoRouteMatched,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Response serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog setup error: {0}")]
    Setup(#[from] catalog::errors::SetupError),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ValidationError),
}

impl AggregatorError {
    /// HTTP status reported to the caller for a failed request.
    pub fn status(&self) -> StatusCode {
        match self {
            AggregatorError::InvalidProductId { .. }
            | AggregatorError::InvalidRequest(_)
            | AggregatorError::RequestBody(_) => StatusCode::BAD_REQUEST,
            AggregatorError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AggregatorError::NoRouteMatched => StatusCode::NOT_FOUND,
            AggregatorError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AggregatorError::Upstream { .. }
            | AggregatorError::UpstreamPayload { .. }
            | AggregatorError::Serialization(_)
            | AggregatorError::Io(_)
            | AggregatorError::Setup(_)
            | AggregatorError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
