//! `cloudcom init` end to end.

use assert_cmd::Command;
use cloudcom_cli::config::ProjectConfig;
use predicates::prelude::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_creates_config_and_support_modules() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("cloudcom")
        .unwrap()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created cloudcom.toml"));

    let config = ProjectConfig::load_from(&temp.path().join("cloudcom.toml")).await.unwrap();
    assert_eq!(config.components.len(), 1);
    assert!(temp.path().join(".cloudcom/CloudComponentRenderCom.js").exists());
    assert!(temp.path().join(".cloudcom/CloudComponentDefError.vue").exists());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("cloudcom.toml"), "# mine\n").unwrap();

    Command::cargo_bin("cloudcom")
        .unwrap()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(std::fs::read_to_string(temp.path().join("cloudcom.toml")).unwrap(), "# mine\n");

    Command::cargo_bin("cloudcom")
        .unwrap()
        .current_dir(temp.path())
        .args(["init", "--force"])
        .assert()
        .success();
}
