//! `cloudcom transform` end to end.

use assert_cmd::Command;
use cloudcom_cli::test_utils::{ProjectFixture, SourceFixture};
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve_runtime() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "runtime": "function () { return null; }", "deps": [] }
        })))
        .mount(&server)
        .await;
    server
}

fn cloudcom(project: &ProjectFixture) -> Command {
    let mut cmd = Command::cargo_bin("cloudcom").unwrap();
    cmd.current_dir(project.path()).arg("--no-progress");
    cmd
}

#[test]
fn test_untouched_source_passes_through() {
    let project = ProjectFixture::new("https://components.invalid/runtime").unwrap();
    let source = SourceFixture::jsx_untouched();
    project.write_source(source.name, source.content).unwrap();

    cloudcom(&project)
        .args(["transform", source.name])
        .assert()
        .success()
        .stdout(predicate::eq(source.content))
        .stderr(predicate::str::contains("0 changed"));

    assert!(!project.file_exists(".cloudcom"));
}

#[test]
fn test_definition_errors_are_rewritten() {
    let project = ProjectFixture::new("https://components.invalid/runtime").unwrap();
    let source = SourceFixture::jsx_definition_errors();
    project.write_source(source.name, source.content).unwrap();

    cloudcom(&project)
        .args(["transform", source.name])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"<CloudComponentDefError tagName="Widget" defValue="" />"#))
        .stdout(predicate::str::contains(
            r#"<CloudComponentDefError def="shop" tagName="Widget" defValue="shop" />"#,
        ))
        .stderr(predicate::str::contains("2 tag(s) with a missing or malformed definition"));

    assert!(project.file_exists(".cloudcom/CloudComponentDefError.jsx"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_write_rewrites_in_place() {
    let server = serve_runtime().await;
    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let jsx = SourceFixture::jsx_single();
    let vue = SourceFixture::vue_single();
    project.write_source(&format!("src/{}", jsx.name), jsx.content).unwrap();
    project.write_source(&format!("src/{}", vue.name), vue.content).unwrap();

    cloudcom(&project)
        .args(["transform", "src/*", "--write"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("2 file(s), 2 changed"));

    let rewritten = project.read("src/App.jsx").unwrap();
    assert!(rewritten.starts_with("import CloudComponentWidgetshop100_"));
    assert!(!rewritten.contains("<Widget"));

    let rewritten = project.read("src/App.vue").unwrap();
    assert!(rewritten.contains("<script setup>\nimport CloudComponentWidgetshop100_"));

    let artifacts = project.component_files().unwrap();
    assert!(artifacts.iter().any(|p| p.extension().is_some_and(|e| e == "js")));
    assert!(artifacts.iter().any(|p| p.extension().is_some_and(|e| e == "vue")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_out_writes_single_file() {
    let server = serve_runtime().await;
    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let source = SourceFixture::jsx_single();
    project.write_source(source.name, source.content).unwrap();

    cloudcom(&project)
        .args(["transform", source.name, "--out", "build/App.jsx"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(project.read("build/App.jsx").unwrap().contains("<CloudComponentWidgetshop100_"));
    assert_eq!(project.read(source.name).unwrap(), source.content);
}

#[test]
fn test_several_inputs_require_write() {
    let project = ProjectFixture::new("https://components.invalid/runtime").unwrap();
    project.write_source("a.jsx", "").unwrap();
    project.write_source("b.jsx", "").unwrap();

    cloudcom(&project)
        .args(["transform", "a.jsx", "b.jsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--write"));
}

#[test]
fn test_missing_input_fails() {
    let project = ProjectFixture::new("https://components.invalid/runtime").unwrap();

    cloudcom(&project)
        .args(["transform", "nope/*.jsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope/*.jsx"));
}

#[test]
fn test_unknown_extension_needs_dialect() {
    let project = ProjectFixture::new("https://components.invalid/runtime").unwrap();
    project.write_source("view.tpl", "<template><Widget /></template>\n").unwrap();

    cloudcom(&project).args(["transform", "view.tpl"]).assert().failure();

    cloudcom(&project)
        .args(["transform", "view.tpl", "--dialect", "vue"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<script setup>"));
}
