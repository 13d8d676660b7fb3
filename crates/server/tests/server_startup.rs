use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config
fn minimal_config(port: u16, db_dir: &TempDir) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[scheduler]
enabled = false

[[processors]]
name = "manual"
kind = "none"

[[processors]]
name = "npm"
kind = "npm"

[processors.settings]
registry_url = "http://127.0.0.1:9"
token = "do-not-leak"
"#,
        port,
        db_dir.path().join("tracker.db").display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_tracker"))
        .env("TRACKER_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config_file = write_config(&minimal_config(port, &db_dir));

    let mut server = spawn_server(config_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["scheduler"], "idle");

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config_file = write_config(&minimal_config(port, &db_dir));

    let mut server = spawn_server(config_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body = response.text().await.expect("Failed to read body");
    assert!(!body.contains("do-not-leak"));

    let json: serde_json::Value = serde_json::from_str(&body).expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["processors"][1]["name"], "npm");
    assert_eq!(
        json["processors"][1]["setting_keys"],
        serde_json::json!(["registry_url", "token"])
    );

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_add_and_list_over_http() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config_file = write_config(&minimal_config(port, &db_dir));

    let mut server = spawn_server(config_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/artifacts", port))
        .json(&serde_json::json!({ "id": "notes", "processor": "manual" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 201);

    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/artifacts", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["total"], 1);
    assert_eq!(json["artifacts"][0]["id"], "notes");

    let metrics = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("tracker_artifacts_by_status"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_tracker"))
            .env("TRACKER_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_processors_section_exits_with_error() {
    let config_file = write_config(
        r#"
[server]
port = 8080
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_tracker"))
            .env("TRACKER_CONFIG", config_file.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_cron_exits_with_error() {
    let config_file = write_config(
        r#"
processors = []

[scheduler]
cron = "whenever"
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_tracker"))
            .env("TRACKER_CONFIG", config_file.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
