//! Configuration management for Blogline
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Backend connection identifiers (API key, project id) are expected to come
//! from an environment-specific config file or from `BLOGLINE_*` environment
//! variables; nothing is embedded in the binary.

use crate::error::{BloglineError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file location relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Main configuration structure for Blogline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend selection and connection settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Feed behavior
    #[serde(default)]
    pub feed: FeedConfig,
    /// Session persistence
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend configuration
///
/// Specifies which backend to talk to and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Type of backend to use (`firebase` or `memory`)
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,

    /// Firebase project settings
    #[serde(default)]
    pub firebase: FirebaseConfig,

    /// Timeout applied to every backend HTTP request (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_backend_type() -> String {
    "firebase".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            firebase: FirebaseConfig::default(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Firebase project configuration
///
/// `api_key` and `project_id` identify the project. The endpoint fields
/// default to Google's public hosts and exist so tests and emulators can
/// point the client elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Web API key of the project
    #[serde(default)]
    pub api_key: String,

    /// Project identifier
    #[serde(default)]
    pub project_id: String,

    /// Auth domain (informational)
    #[serde(default)]
    pub auth_domain: Option<String>,

    /// Application identifier (informational)
    #[serde(default)]
    pub app_id: Option<String>,

    /// Firestore database id
    #[serde(default = "default_database")]
    pub database: String,

    /// Identity Toolkit base URL
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// Secure Token base URL
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Firestore base URL
    #[serde(default = "default_firestore_endpoint")]
    pub firestore_endpoint: String,
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_auth_endpoint() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_token_endpoint() -> String {
    "https://securetoken.googleapis.com".to_string()
}

fn default_firestore_endpoint() -> String {
    "https://firestore.googleapis.com".to_string()
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            auth_domain: None,
            app_id: None,
            database: default_database(),
            auth_endpoint: default_auth_endpoint(),
            token_endpoint: default_token_endpoint(),
            firestore_endpoint: default_firestore_endpoint(),
        }
    }
}

/// Feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Collection holding the posts
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Reload the feed after each successful post
    #[serde(default)]
    pub refresh_after_post: bool,
}

fn default_collection() -> String {
    "posts".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            refresh_after_post: false,
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Keep the session in the OS keyring between runs
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Keyring service name
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_persist() -> bool {
    true
}

fn default_keyring_service() -> String {
    "blogline-session".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: default_persist(),
            keyring_service: default_keyring_service(),
        }
    }
}

impl Config {
    /// Resolve the config file path
    ///
    /// An explicit path wins. Otherwise `config/config.yaml` is used when it
    /// exists, falling back to the per-user config directory.
    pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
        if let Some(path) = explicit {
            return PathBuf::from(path);
        }

        let local = PathBuf::from(DEFAULT_CONFIG_PATH);
        if local.exists() {
            return local;
        }

        ProjectDirs::from("com", "blogline", "blogline")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .unwrap_or(local)
    }

    /// Load configuration from file, environment, and CLI
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded configuration. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: impl AsRef<Path>, cli: &crate::cli::Cli) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(BloglineError::from)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(backend) = std::env::var("BLOGLINE_BACKEND") {
            self.backend.backend_type = backend;
        }

        if let Ok(api_key) = std::env::var("BLOGLINE_FIREBASE_API_KEY") {
            self.backend.firebase.api_key = api_key;
        }

        if let Ok(project_id) = std::env::var("BLOGLINE_FIREBASE_PROJECT_ID") {
            self.backend.firebase.project_id = project_id;
        }

        if let Ok(endpoint) = std::env::var("BLOGLINE_FIREBASE_AUTH_ENDPOINT") {
            self.backend.firebase.auth_endpoint = endpoint;
        }

        if let Ok(endpoint) = std::env::var("BLOGLINE_FIREBASE_TOKEN_ENDPOINT") {
            self.backend.firebase.token_endpoint = endpoint;
        }

        if let Ok(endpoint) = std::env::var("BLOGLINE_FIREBASE_FIRESTORE_ENDPOINT") {
            self.backend.firebase.firestore_endpoint = endpoint;
        }

        if let Ok(timeout) = std::env::var("BLOGLINE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.backend.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid BLOGLINE_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(collection) = std::env::var("BLOGLINE_FEED_COLLECTION") {
            self.feed.collection = collection;
        }

        if let Ok(refresh) = std::env::var("BLOGLINE_REFRESH_AFTER_POST") {
            match parse_bool(&refresh) {
                Some(value) => self.feed.refresh_after_post = value,
                None => tracing::warn!("Invalid BLOGLINE_REFRESH_AFTER_POST: {}", refresh),
            }
        }

        if let Ok(persist) = std::env::var("BLOGLINE_SESSION_PERSIST") {
            match parse_bool(&persist) {
                Some(value) => self.session.persist = value,
                None => tracing::warn!("Invalid BLOGLINE_SESSION_PERSIST: {}", persist),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(backend) = &cli.backend {
            tracing::debug!("Using backend override: {}", backend);
            self.backend.backend_type = backend.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let valid_backends = ["firebase", "memory"];
        if !valid_backends.contains(&self.backend.backend_type.as_str()) {
            return Err(BloglineError::Config(format!(
                "Invalid backend type: {}. Must be one of: {}",
                self.backend.backend_type,
                valid_backends.join(", ")
            ))
            .into());
        }

        if self.backend.backend_type == "firebase" {
            if self.backend.firebase.api_key.trim().is_empty() {
                return Err(BloglineError::Config(
                    "backend.firebase.api_key is required (or set BLOGLINE_FIREBASE_API_KEY)"
                        .to_string(),
                )
                .into());
            }

            if self.backend.firebase.project_id.trim().is_empty() {
                return Err(BloglineError::Config(
                    "backend.firebase.project_id is required (or set BLOGLINE_FIREBASE_PROJECT_ID)"
                        .to_string(),
                )
                .into());
            }

            for (name, endpoint) in [
                ("auth_endpoint", &self.backend.firebase.auth_endpoint),
                ("token_endpoint", &self.backend.firebase.token_endpoint),
                ("firestore_endpoint", &self.backend.firebase.firestore_endpoint),
            ] {
                if url::Url::parse(endpoint).is_err() {
                    return Err(BloglineError::Config(format!(
                        "backend.firebase.{} is not a valid URL: {}",
                        name, endpoint
                    ))
                    .into());
                }
            }
        }

        if self.backend.timeout_seconds == 0 {
            return Err(BloglineError::Config(
                "backend.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.backend.timeout_seconds > 600 {
            return Err(BloglineError::Config(
                "backend.timeout_seconds must be less than or equal to 600".to_string(),
            )
            .into());
        }

        let collection = self.feed.collection.trim();
        if collection.is_empty() || collection.contains('/') {
            return Err(BloglineError::Config(format!(
                "feed.collection must be a single non-empty collection id: {:?}",
                self.feed.collection
            ))
            .into());
        }

        if self.session.persist && self.session.keyring_service.trim().is_empty() {
            return Err(BloglineError::Config(
                "session.keyring_service cannot be empty when persist is enabled".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
