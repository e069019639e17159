pub mod api;
pub mod config;
pub mod errors;
pub mod executor;
pub mod metrics_defs;
pub mod projector;
pub mod rate_limit;
pub mod request_id;
pub mod router;
pub mod service;

#[cfg(test)]
mod testutils;

use catalog::ProductCatalog;
use catalog::circuit_breaker::CircuitState;
use catalog::types::CallKind;
use errors::AggregatorError;
use executor::FanOutExecutor;
use rate_limit::RateLimiter;
use router::{GatewayService, Router};
use service::SimilarProducts;
use shared::admin_service::AdminService;
use shared::http::run_http_service;

/// Builds the catalog and serves the gateway and admin listeners until one of them fails.
pub async fn run(config: config::Config) -> Result<(), AggregatorError> {
    config.validate()?;

    let catalog = ProductCatalog::from_config(&config.catalog)?;
    let gateway_service = build_service(&config, catalog.clone());

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        gateway_service,
    );

    // Not ready while the similar-id breaker is open: every request would come back empty.
    let admin_service = AdminService::new(move || {
        catalog.breaker_state(CallKind::SimilarIds) != CircuitState::Open
    });
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}

fn build_service(config: &config::Config, catalog: ProductCatalog) -> GatewayService {
    let executor = FanOutExecutor::new(catalog.clone(), config.fanout_deadline());
    let service = SimilarProducts::new(catalog, executor);
    let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
    GatewayService::new(Router::new(service, rate_limiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FanoutConfig, Listener};
    use crate::request_id::REQUEST_ID_HEADER;
    use serde_json::json;
    use shared::http::serve;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn start_gateway(upstream: &MockServer) -> SocketAddr {
        let mut catalog_config =
            catalog::config::Config::new(url::Url::parse(&upstream.uri()).unwrap());
        catalog_config.timeouts.response_ms = 200;
        catalog_config.timeouts.read_ms = 200;
        catalog_config.timeouts.write_ms = 200;
        for policy in [
            &mut catalog_config.similar_ids,
            &mut catalog_config.product_detail,
        ] {
            policy.retry.base_delay_ms = 10;
            policy.retry.max_delay_ms = 20;
        }

        let config = Config {
            listener: Listener {
                host: "127.0.0.1".into(),
                port: 1,
            },
            admin_listener: Listener {
                host: "127.0.0.1".into(),
                port: 2,
            },
            catalog: catalog_config,
            fanout: FanoutConfig::default(),
            rate_limit: None,
        };
        config.validate().unwrap();

        let catalog = ProductCatalog::from_config(&config.catalog).unwrap();
        let service = build_service(&config, catalog);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, service));
        addr
    }

    async fn mount_product(upstream: &MockServer, id: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/product/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id.to_string(),
                "name": format!("Product {id}"),
                "price": 29.99,
                "availability": id % 2 == 0
            })))
            .mount(upstream)
            .await;
    }

    #[tokio::test]
    async fn test_similar_products_end_to_end() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product/1/similarids"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([2, 3, 4])))
            .expect(1)
            .mount(&upstream)
            .await;
        mount_product(&upstream, 2).await;
        mount_product(&upstream, 4).await;
        Mock::given(method("GET"))
            .and(path("/product/3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "3"}))
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&upstream)
            .await;

        let addr = start_gateway(&upstream).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("http://{addr}/product/1/similar"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!([
                {"id": "2", "name": "Product 2", "price": 29.99, "availability": true},
                {"id": "4", "name": "Product 4", "price": 29.99, "availability": true}
            ])
        );

        // Same answer over RPC, served from the cache.
        let response = client
            .post(format!(
                "http://{addr}/api/0/product-rpc/get_similar_products"
            ))
            .json(&json!({"args": {"productId": "1"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["products"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stage_one_outcomes_end_to_end() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product/1/similarids"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .and(path("/product/2/similarids"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&upstream)
            .await;

        let addr = start_gateway(&upstream).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("http://{addr}/product/1/similar"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!([]));

        let response = client
            .get(format!("http://{addr}/product/2/similar"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
        let request_id = response.headers()[REQUEST_ID_HEADER]
            .to_str()
            .unwrap()
            .to_string();
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], 500);
        assert_eq!(body["requestId"], request_id.as_str());
        assert!(body["timestamp"].is_string());
        assert!(body["error"].as_str().unwrap().contains("503"));
    }
}
