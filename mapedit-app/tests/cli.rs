use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SAMPLE: &str = r#"{"name":"Lobby","deathHeight":-64,"locations":{"spawn":[{"x":1,"y":2,"z":3,"yaw":0,"pitch":0,"customOptions":{}}],"npc":[]}}"#;

/// 在隔离的临时目录中运行二进制，避免读取仓库里的配置。
fn mapedit(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mapedit").expect("mapedit 二进制应已构建");
    cmd.current_dir(workdir)
        .env_remove("MAPEDIT_CONFIG")
        .env_remove("MAPEDIT_EXPORT_DIR")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn paste_edit_and_export() {
    let dir = TempDir::new().unwrap();
    let script = format!(
        "paste\n{SAMPLE}\n.\nselect spawn\nset deathHeight -70\nedit 0 x 5\nexport\nquit\n"
    );

    mapedit(dir.path())
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains("已载入 Pasted JSON"))
        .stdout(predicate::str::contains("已导出到"));

    let exported = fs::read_to_string(dir.path().join("map_data.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert_eq!(value["deathHeight"], serde_json::json!(-70));
    assert_eq!(value["locations"]["spawn"][0]["x"], serde_json::json!(5));
    assert!(exported.starts_with("{\n  \"name\": \"Lobby\""));
}

#[test]
fn file_flag_preloads_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lobby.json");
    fs::write(&path, SAMPLE).unwrap();

    mapedit(dir.path())
        .arg("--file")
        .arg(&path)
        .write_stdin("status\ncategories\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("来源: lobby.json"))
        .stdout(predicate::str::contains("npc (0 个条目)"));
}

#[test]
fn commands_without_document_show_notice() {
    let dir = TempDir::new().unwrap();
    mapedit(dir.path())
        .write_stdin("list\nselect spawn\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("No JSON Loaded"));
}

#[test]
fn broken_paste_file_reports_error_and_continues() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("paste.txt");
    fs::write(&path, "1 {\n2 \"name\": \"x\"\n").unwrap();

    mapedit(dir.path())
        .arg("--paste-file")
        .arg(&path)
        .write_stdin("quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error parsing pasted JSON"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    mapedit(dir.path())
        .args(["--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn conflicting_sources_are_rejected() {
    let dir = TempDir::new().unwrap();
    mapedit(dir.path())
        .args(["--file", "a.json", "--url", "https://example.com/a.json"])
        .assert()
        .failure();
}

#[cfg(not(feature = "bevy_app"))]
#[test]
fn bevy_mode_without_feature_fails() {
    let dir = TempDir::new().unwrap();
    mapedit(dir.path())
        .arg("--bevy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bevy_app"));
}
