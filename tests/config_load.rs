//! Integration test: loading `config.yaml` from disk.

use std::path::Path;

use tuition_assistant::config::Config;

#[tokio::test]
async fn template_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/config.yaml");
    let cfg = Config::load(&path)
        .await
        .unwrap_or_else(|e| panic!("templates/config.yaml failed to load: {e:?}"));

    // The template spells out the defaults.
    assert_eq!(cfg.model, Config::default().model);
    assert_eq!(cfg.backend, Config::default().backend);
    assert_eq!(cfg.sessions, Config::default().sessions);
}

#[tokio::test]
async fn full_config_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
server:
  addr: 0.0.0.0:8080
model:
  endpoint: http://localhost:11434/v1/chat/completions
  model: llama3
  api_key: local-key
  timeout_secs: 30
backend:
  base_url: http://tuition:5025/api/v1
  timeout_secs: 5
sessions:
  capacity: 50
  ttl_secs: 600
"#,
    )
    .unwrap();

    let cfg = Config::load(&path).await.unwrap();
    assert_eq!(cfg.server.addr.port(), 8080);
    assert_eq!(cfg.model.model, "llama3");
    assert_eq!(cfg.model.api_key().unwrap(), "local-key");
    assert_eq!(cfg.model.timeout(), Some(std::time::Duration::from_secs(30)));
    assert_eq!(cfg.backend.timeout(), Some(std::time::Duration::from_secs(5)));
    assert_eq!(cfg.sessions.capacity, 50);
    assert_eq!(cfg.sessions.ttl_secs, 600);
}

#[tokio::test]
async fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::load(&dir.path().join("config.yaml")).await.unwrap();
    assert_eq!(cfg.model.model, "llama-3.3-70b-versatile");
    assert_eq!(cfg.sessions.ttl_secs, 24 * 60 * 60);
}

// ── deny_unknown_fields validation ──────────────────────────

#[tokio::test]
async fn unknown_top_level_field_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "server: {}\nfoo_unknown: true\n").unwrap();

    let result = Config::load(&path).await;
    assert!(result.is_err(), "unknown top-level field should cause a parse error");
    let err_msg = format!("{:?}", result.unwrap_err());
    assert!(
        err_msg.contains("unknown field") || err_msg.contains("foo_unknown"),
        "error should mention the unknown field, got: {err_msg}"
    );
}

#[tokio::test]
async fn unknown_section_field_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_backend.yaml");
    std::fs::write(&path, "backend:\n  base_url: http://x/api\n  retries: 3\n").unwrap();

    let err_msg = format!("{:?}", Config::load(&path).await.unwrap_err());
    assert!(
        err_msg.contains("unknown field") || err_msg.contains("retries"),
        "error should mention the unknown field, got: {err_msg}"
    );
}

#[tokio::test]
async fn zero_capacity_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "sessions:\n  capacity: 0\n").unwrap();

    let err_msg = format!("{:?}", Config::load(&path).await.unwrap_err());
    assert!(err_msg.contains("capacity"), "got: {err_msg}");
}
