use crate::api::parse_product_id;
use crate::errors::Result;
use crate::projector::project;
use crate::service::SimilarProducts;
use http::StatusCode;
use hyper::Response;
use shared::http::{ResponseBody, json_response};

/// `GET /product/{productId}/similar`
///
/// Responds with a JSON array of products, empty when nothing similar was found.
pub async fn similar_products(
    service: &SimilarProducts,
    raw_id: &str,
) -> Result<Response<ResponseBody>> {
    let id = parse_product_id(raw_id)?;
    let records = service.get_similar_products(id).await?;
    Ok(json_response(StatusCode::OK, &project(&records))?)
}

/// Extracts the raw id from a `/product/{productId}/similar` path.
pub fn match_path(path: &str) -> Option<&str> {
    path.strip_prefix("/product/")
        .and_then(|rest| rest.strip_suffix("/similar"))
        .filter(|raw_id| !raw_id.contains('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_path() {
        assert_eq!(match_path("/product/1/similar"), Some("1"));
        assert_eq!(match_path("/product/abc/similar"), Some("abc"));
        assert_eq!(match_path("/product//similar"), Some(""));
        assert_eq!(match_path("/product/1/2/similar"), None);
        assert_eq!(match_path("/product/1"), None);
        assert_eq!(match_path("/products/1/similar"), None);
        assert_eq!(match_path("/product/1/similar/"), None);
    }
}
