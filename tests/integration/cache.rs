//! `cloudcom cache` end to end.

use assert_cmd::Command;
use cloudcom_cli::test_utils::{ProjectFixture, SourceFixture};
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn transformed_project() -> (MockServer, ProjectFixture) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "runtime": "function () {}",
                "deps": [{ "namespace": "button", "version": "2.0.0" }]
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "runtime": "function () {}" }
        })))
        .mount(&server)
        .await;

    let project = ProjectFixture::new(&format!("{}/runtime", server.uri())).unwrap();
    let source = SourceFixture::jsx_single();
    project.write_source(source.name, source.content).unwrap();

    cloudcom(&project).args(["transform", source.name, "--write"]).assert().success();
    (server, project)
}

fn cloudcom(project: &ProjectFixture) -> Command {
    let mut cmd = Command::cargo_bin("cloudcom").unwrap();
    cmd.current_dir(project.path()).arg("--no-progress");
    cmd
}

#[test]
fn test_list_empty_cache() {
    let project = ProjectFixture::new("https://components.invalid/runtime").unwrap();

    cloudcom(&project)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached components"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_json() {
    let (_server, project) = transformed_project().await;

    let output = cloudcom(&project).args(["cache", "list", "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["tag"] == "Widget" && e["success"] == true));
    assert!(entries.iter().any(|e| e["deps"] == json!(["button@2.0.0"])));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_verify_detects_missing_artifacts() {
    let (_server, project) = transformed_project().await;

    cloudcom(&project).args(["cache", "verify"]).assert().success();

    for artifact in project.component_files().unwrap() {
        std::fs::remove_file(artifact).unwrap();
    }

    cloudcom(&project)
        .args(["cache", "verify"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("artifact missing"))
        .stderr(predicate::str::contains("2 cache entries point at missing artifacts"));
}
