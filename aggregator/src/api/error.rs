use crate::errors::AggregatorError;
use http::StatusCode;
use hyper::Response;
use serde::Serialize;
use shared::http::{ResponseBody, json_response, make_error_response};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Error body of the REST endpoint.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub request_id: String,
}

/// Error body of the RPC endpoint.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RpcStatus {
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
}

pub fn rpc_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "INVALID_ARGUMENT",
        StatusCode::TOO_MANY_REQUESTS => "RESOURCE_EXHAUSTED",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "UNIMPLEMENTED",
        _ => "INTERNAL",
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

pub fn rest_error_response(err: &AggregatorError, request_id: &str) -> Response<ResponseBody> {
    let status = err.status();
    let body = ErrorResponse {
        timestamp: now_rfc3339(),
        status: status.as_u16(),
        error: err.to_string(),
        request_id: request_id.to_string(),
    };
    json_response(status, &body).unwrap_or_else(|_| make_error_response(status))
}

pub fn rpc_error_response(err: &AggregatorError, request_id: &str) -> Response<ResponseBody> {
    let status = err.status();
    let body = RpcStatus {
        code: rpc_code(status),
        message: err.to_string(),
        request_id: request_id.to_string(),
    };
    json_response(status, &body).unwrap_or_else(|_| make_error_response(status))
}
