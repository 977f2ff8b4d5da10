//! [`HttpFetcher`] against a wiremock endpoint.

use cloudcom_cli::component::ComponentReference;
use cloudcom_cli::resolver::{ComponentFetcher, FetchError, FetchRequest, HttpFetcher};
use reqwest::Url;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(api: &str, namespace: &str, version: &str) -> FetchRequest {
    FetchRequest {
        reference: ComponentReference::new("Widget", namespace, version),
        identifier: format!("Cc{namespace}"),
        api: Url::parse(api).unwrap(),
    }
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_decodes_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime"))
        .and(query_param("namespace", "shop"))
        .and(query_param("version", "1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "runtime": "function () { return null; }",
                "deps": [{ "namespace": "button", "version": "2.0.0" }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = fetcher()
        .fetch(&request(&format!("{}/runtime", server.uri()), "shop", "1.0.0"))
        .await
        .unwrap();

    assert_eq!(payload.runtime, "function () { return null; }");
    assert_eq!(payload.deps.len(), 1);
    assert_eq!(payload.deps[0].namespace, "button");
}

#[tokio::test]
async fn test_fetch_keeps_existing_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime"))
        .and(query_param("env", "prod"))
        .and(query_param("namespace", "shop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "runtime": "function () {}" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = fetcher()
        .fetch(&request(&format!("{}/runtime?env=prod", server.uri()), "shop", "1.0.0"))
        .await
        .unwrap();

    assert!(payload.deps.is_empty());
}

#[tokio::test]
async fn test_non_200_is_a_status_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&request(&format!("{}/runtime", server.uri()), "missing", "1.0.0"))
        .await
        .unwrap_err();

    assert_eq!(error, FetchError::Status(404));
}

#[tokio::test]
async fn test_lenient_dependency_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "runtime": "function () {}",
                "deps": [
                    { "namespace": "button", "version": "2.0.0" },
                    { "namespace": "broken" },
                    "not an object"
                ]
            }
        })))
        .mount(&server)
        .await;

    let payload = fetcher()
        .fetch(&request(&format!("{}/runtime", server.uri()), "shop", "1.0.0"))
        .await
        .unwrap();

    assert_eq!(payload.deps.len(), 1);
    assert_eq!(payload.deps[0].version, "2.0.0");
}

#[tokio::test]
async fn test_invalid_body_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let error = fetcher()
        .fetch(&request(&format!("{}/runtime", server.uri()), "shop", "1.0.0"))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Decode(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "runtime": "function () {}" } }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();
    let error = fetcher
        .fetch(&request(&format!("{}/runtime", server.uri()), "shop", "1.0.0"))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::Timeout(_)));
}
