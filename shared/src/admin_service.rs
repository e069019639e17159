use crate::http::{ResponseBody, full_body, make_error_response};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

/// Serves `/health` and `/ready` on the admin listener.
///
/// Health is unconditional once the process accepts connections. Readiness is
/// delegated to `is_ready`, which is evaluated once per request.
pub struct AdminService<F> {
    is_ready: F,
}

impl<F> AdminService<F>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self { is_ready }
    }
}

fn admin_response(path: &str, is_ready: bool) -> Response<ResponseBody> {
    match path {
        "/health" => Response::new(full_body("ok\n")),
        "/ready" if is_ready => Response::new(full_body("ok\n")),
        "/ready" => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
        _ => make_error_response(StatusCode::NOT_FOUND),
    }
}

impl<F> Service<Request<Incoming>> for AdminService<F>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let response = admin_response(req.uri().path(), (self.is_ready)());
        Box::pin(async move { Ok(response) })
    }
}
