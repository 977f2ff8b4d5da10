//! [`Transformer`] over real HTTP.

use cloudcom_cli::Transformer;
use cloudcom_cli::config::ProjectConfig;
use cloudcom_cli::scanner::Dialect;
use cloudcom_cli::test_utils::{ProjectFixture, SourceFixture};
use serde_json::json;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_runtime(server: &MockServer, namespace: &str, runtime: &str, deps: serde_json::Value) {
    Mock::given(method("GET"))
        .and(query_param("namespace", namespace))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "runtime": runtime, "deps": deps }
        })))
        .mount(server)
        .await;
}

async fn load(project: &ProjectFixture) -> Transformer {
    let config = ProjectConfig::load_from(&project.config_path()).await.unwrap();
    Transformer::from_config(&config).await.unwrap()
}

#[tokio::test]
async fn test_transform_with_dependencies() {
    let server = MockServer::start().await;
    mount_runtime(&server, "shop", "function () { return 'shop'; }", json!([
        { "namespace": "button", "version": "2.0.0" }
    ]))
    .await;
    mount_runtime(&server, "button", "function () { return 'button'; }", json!([])).await;

    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let transformer = load(&project).await;
    let source = SourceFixture::jsx_single();

    let output = transformer.transform(source.content, Dialect::Jsx).await.unwrap();

    assert!(output.changed);
    assert_eq!(output.report.fetched, 2);
    assert_eq!(output.report.failed, 0);

    let identity = &output.references[0].identity;
    let entry = std::fs::read_to_string(&identity.path).unwrap();
    assert!(entry.contains("comDefs[\"button-2.0.0\"]"));
    assert!(entry.contains("function RenderCom () { return 'shop'; }"));

    assert_eq!(project.component_files().unwrap().len(), 2);
    assert!(project.file_exists(".cloudcom/cache.json"));
}

#[tokio::test]
async fn test_cache_survives_a_new_transformer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "runtime": "function () {}" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let source = SourceFixture::jsx_single();

    let first = load(&project).await.transform(source.content, Dialect::Jsx).await.unwrap();
    assert_eq!(first.report.fetched, 1);

    let second = load(&project).await.transform(source.content, Dialect::Jsx).await.unwrap();
    assert_eq!(second.report.fetched, 0);
    assert_eq!(second.report.cache_hits, 1);
    assert_eq!(first.code, second.code);
}

#[tokio::test]
async fn test_unreachable_component_gets_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let transformer = load(&project).await;
    let source = SourceFixture::vue_single();

    let output = transformer.transform(source.content, Dialect::Vue).await.unwrap();

    assert_eq!(output.report.failed, 1);
    assert!(output.changed);
    let identity = &output.references[0].identity;
    assert!(output.code.contains(&format!("import {} from", identity.identifier)));
    assert!(output.code.contains(&format!("<{} def=\"shop@1.0.0\" />", identity.identifier)));
    assert!(!output.code.contains("<Widget"));
    let artifact = std::fs::read_to_string(&identity.path).unwrap();
    assert!(artifact.contains("namespace = shop, version = 1.0.0) not found."));

    let cache = project.read(".cloudcom/cache.json").unwrap();
    let doc: serde_json::Value = serde_json::from_str(&cache).unwrap();
    assert_eq!(doc["Widget"][&identity.identifier]["success"], false);
}

#[tokio::test]
async fn test_untouched_source_does_not_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let transformer = load(&project).await;
    let source = SourceFixture::jsx_untouched();

    let output = transformer.transform(source.content, Dialect::Jsx).await.unwrap();

    assert_eq!(output.code, source.content);
    assert!(!project.file_exists(".cloudcom"));
}
