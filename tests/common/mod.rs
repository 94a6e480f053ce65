use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Config for the in-memory backend with persistence off
#[allow(dead_code)]
pub const MEMORY_CONFIG: &str = r#"
backend:
  type: memory
session:
  persist: false
"#;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Firebase config pointing every endpoint at a mock server
#[allow(dead_code)]
pub fn firebase_config(base_url: &str) -> blogline::config::FirebaseConfig {
    blogline::config::FirebaseConfig {
        api_key: "test-key".to_string(),
        project_id: "my-blog".to_string(),
        auth_endpoint: base_url.to_string(),
        token_endpoint: base_url.to_string(),
        firestore_endpoint: base_url.to_string(),
        ..Default::default()
    }
}
