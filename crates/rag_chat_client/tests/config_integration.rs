//! Integration tests for config load/save and the values derived from it.

use std::time::Duration;

use predicates::prelude::*;
use rag_chat_client::config::{self, DEFAULT_BASE_URL};
use rag_chat_client::{Config, ConfigError, RetrievalParameters, RetryPolicy};

#[test]
fn load_existing_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        r#"
backend:
  base_url: "https://rag.example.com"
  timeout_secs: 10
retrieval:
  top_k: 8
  threshold: 0.75
retry:
  max_attempts: 2
  base_delay_ms: 250
  max_jitter_ms: 0
widget:
  state_path: "/tmp/rag-chat/state.json"
"#,
    )
    .unwrap();

    let cfg = config::load(&config_path).expect("load should succeed");
    assert_eq!(cfg.base_url(), "https://rag.example.com");
    assert_eq!(cfg.timeout().unwrap(), Duration::from_secs(10));
    assert_eq!(
        cfg.retrieval_parameters().unwrap(),
        RetrievalParameters {
            top_k: 8,
            threshold: 0.75
        }
    );
    assert_eq!(
        cfg.retry_policy().unwrap(),
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(250),
            max_jitter: Duration::ZERO,
        }
    );
    assert_eq!(
        cfg.state_path(),
        Some(std::path::PathBuf::from("/tmp/rag-chat/state.json"))
    );
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "backend: {}\n").unwrap();

    let cfg = config::load(&config_path).expect("load should succeed");
    assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
    assert_eq!(cfg.timeout().unwrap(), Duration::from_secs(30));
    assert_eq!(
        cfg.retrieval_parameters().unwrap(),
        RetrievalParameters::default()
    );
    assert_eq!(cfg.retry_policy().unwrap(), RetryPolicy::default());
}

#[test]
fn out_of_range_values_are_rejected() {
    let mut cfg = Config::default();
    cfg.retrieval.threshold = Some(1.2);
    assert!(matches!(
        cfg.retrieval_parameters(),
        Err(ConfigError::Invalid(_))
    ));

    let mut cfg = Config::default();
    cfg.retrieval.top_k = Some(0);
    assert!(matches!(
        cfg.retrieval_parameters(),
        Err(ConfigError::Invalid(_))
    ));

    let mut cfg = Config::default();
    cfg.retry.max_attempts = Some(0);
    assert!(matches!(cfg.retry_policy(), Err(ConfigError::Invalid(_))));
}

#[test]
fn attempt_budget_and_timeout_cannot_grow() {
    let mut cfg = Config::default();
    cfg.retry.max_attempts = Some(4);
    assert!(matches!(cfg.retry_policy(), Err(ConfigError::Invalid(_))));
    cfg.retry.max_attempts = Some(3);
    assert_eq!(cfg.retry_policy().unwrap().max_attempts, 3);

    cfg.backend.timeout_secs = Some(31);
    assert!(matches!(cfg.timeout(), Err(ConfigError::Invalid(_))));
    cfg.backend.timeout_secs = Some(0);
    assert!(matches!(cfg.timeout(), Err(ConfigError::Invalid(_))));
    cfg.backend.timeout_secs = Some(30);
    assert_eq!(cfg.timeout().unwrap(), Duration::from_secs(30));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "retrieval:\n  top_k: [not, a, number]\n").unwrap();
    assert!(matches!(
        config::load(&config_path),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn save_creates_directory_and_file_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("rag-chat");
    let config_path = config_dir.join("config.yaml");
    assert!(!config_dir.exists(), "config dir should not exist yet");

    let mut cfg = Config::default();
    cfg.backend.base_url = Some("https://rag.example.com".into());
    cfg.retrieval.top_k = Some(3);

    config::save(&config_path, &cfg).expect("save should succeed");
    let pred = predicates::path::exists();
    assert!(pred.eval(&config_path), "config file should exist after save");

    let contents = std::fs::read_to_string(&config_path).unwrap();
    assert!(predicates::str::contains("backend:").eval(&contents));
    assert!(predicates::str::contains("base_url").eval(&contents));
    assert!(
        predicates::str::contains("threshold").not().eval(&contents),
        "unset fields should not be written"
    );

    let reloaded = config::load(&config_path).expect("reload should succeed");
    assert_eq!(reloaded.base_url(), "https://rag.example.com");
    assert_eq!(reloaded.retrieval.top_k, Some(3));
}

/// Config path resolves to `~/.rag-chat/config.yaml` using the current platform's home dir.
/// We override the HOME env var to a temp dir to verify the resolution.
#[test]
fn default_paths_use_home_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap().to_string();

    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let original = std::env::var(key).ok();

    std::env::set_var(key, &home);
    let config_path = config::default_config_path();
    let state_path = Config::default().state_path();
    match original {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }

    assert_eq!(
        config_path.expect("should resolve a config path"),
        dir.path().join(".rag-chat").join("config.yaml")
    );
    assert_eq!(
        state_path.expect("should resolve a state path"),
        dir.path().join(".rag-chat").join("state.json")
    );
}
