use crate::api::error::{rest_error_response, rpc_error_response};
use crate::api::{rest, rpc};
use crate::errors::{AggregatorError, Result};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT, REQUESTS_RATE_LIMITED};
use crate::rate_limit::RateLimiter;
use crate::request_id::{REQUEST_ID_HEADER, RequestIdGenerator};
use crate::service::SimilarProducts;
use http::{HeaderValue, Method};
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::http::ResponseBody;
use shared::{counter, gauge, histogram};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Upper bound on RPC request bodies.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    SimilarProducts { raw_id: String },
    GetSimilarProductsRpc,
    Unknown,
}

impl Endpoint {
    fn from_path(path: &str) -> Self {
        if let Some(raw_id) = rest::match_path(path) {
            return Endpoint::SimilarProducts {
                raw_id: raw_id.to_string(),
            };
        }
        if path == rpc::GET_SIMILAR_PRODUCTS_PATH {
            return Endpoint::GetSimilarProductsRpc;
        }
        Endpoint::Unknown
    }

    fn name(&self) -> &'static str {
        match self {
            Endpoint::SimilarProducts { .. } => "rest_similar_products",
            Endpoint::GetSimilarProductsRpc => "rpc_get_similar_products",
            Endpoint::Unknown => "unknown",
        }
    }
}

struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

/// Dispatches inbound requests to the REST and RPC endpoints.
///
/// Every response, successful or not, carries a freshly issued `x-request-id`
/// header. Error bodies repeat the same id.
#[derive(Clone)]
pub struct Router {
    service: SimilarProducts,
    rate_limiter: Option<Arc<RateLimiter>>,
    request_ids: Arc<RequestIdGenerator>,
}

impl Router {
    pub fn new(service: SimilarProducts, rate_limiter: Option<RateLimiter>) -> Self {
        Self {
            service,
            rate_limiter: rate_limiter.map(Arc::new),
            request_ids: Arc::new(RequestIdGenerator::new()),
        }
    }

    pub async fn route<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let _inflight = InflightGuard::new();
        let started = Instant::now();
        let request_id = self.request_ids.issue();
        let endpoint = Endpoint::from_path(req.uri().path());
        let method = req.method().clone();

        let mut response = match self.dispatch(req, &endpoint).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(
                    request_id = %request_id,
                    method = %method,
                    endpoint = endpoint.name(),
                    error = %e,
                    "Request failed"
                );
                match endpoint {
                    Endpoint::GetSimilarProductsRpc => rpc_error_response(&e, &request_id),
                    _ => rest_error_response(&e, &request_id),
                }
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        histogram!(
            REQUEST_DURATION,
            "status" => response.status().as_str().to_string(),
            "endpoint" => endpoint.name()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(
        &self,
        req: Request<B>,
        endpoint: &Endpoint,
    ) -> Result<Response<ResponseBody>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        if let Some(limiter) = &self.rate_limiter
            && !limiter.try_acquire()
        {
            counter!(REQUESTS_RATE_LIMITED).increment(1);
            return Err(AggregatorError::RateLimited);
        }

        match endpoint {
            Endpoint::SimilarProducts { raw_id } => {
                if req.method() != Method::GET {
                    return Err(AggregatorError::MethodNotAllowed);
                }
                rest::similar_products(&self.service, raw_id).await
            }
            Endpoint::GetSimilarProductsRpc => {
                if req.method() != Method::POST {
                    return Err(AggregatorError::MethodNotAllowed);
                }
                let body = read_body(req.into_body()).await?;
                rpc::get_similar_products(&self.service, &body).await
            }
            Endpoint::Unknown => {
                tracing::warn!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    "No route matched"
                );
                Err(AggregatorError::NoRouteMatched)
            }
        }
    }
}

async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| AggregatorError::RequestBody(e.to_string()))
}

/// hyper service wrapping the [`Router`].
pub struct GatewayService {
    router: Router,
}

impl GatewayService {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move { Ok(router.route(req).await) })
    }
}
