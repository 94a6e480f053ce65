//! Backend abstraction for Blogline
//!
//! The client never stores posts or verifies credentials itself. Both are
//! delegated to a backend reached through two traits:
//!
//! - [`AuthBackend`]: account creation, sign-in, sign-out, token refresh
//! - [`PostStore`]: append a post, query the collection newest-first
//!
//! Implementations:
//!
//! - [`firebase::FirebaseBackend`]: Firebase Auth + Firestore over REST
//! - [`memory::MemoryBackend`]: in-process accounts and posts

pub mod firebase;
pub mod memory;
pub mod types;

pub use firebase::FirebaseBackend;
pub use memory::MemoryBackend;
pub use types::{NewPost, Post, Session, Timestamp, ANONYMOUS_AUTHOR};

use crate::config::Config;
use crate::error::{BloglineError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Authentication half of the backend contract
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Create an account and return its first session
    ///
    /// # Errors
    ///
    /// Returns [`BloglineError::Authentication`] with the backend's code
    /// (email in use, weak password, network failure, ...)
    async fn create_account(&self, email: &str, password: &str) -> Result<Session>;

    /// Sign in with email and password
    ///
    /// # Errors
    ///
    /// Returns [`BloglineError::Authentication`] on rejected credentials
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// End a session on the backend side
    ///
    /// Backends with purely client-side sessions treat this as a no-op.
    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// Exchange the session's refresh token for a new id token
    ///
    /// # Errors
    ///
    /// Returns [`BloglineError::Authentication`] with kind `SessionExpired`
    /// when the refresh token is revoked or missing
    async fn refresh(&self, session: &Session) -> Result<Session>;
}

/// Document store half of the backend contract
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Append a post; the store assigns id and timestamp
    ///
    /// # Returns
    ///
    /// Returns the new document id
    async fn append_post(&self, post: &NewPost, auth: Option<&Session>) -> Result<String>;

    /// All posts, newest first by server timestamp
    async fn query_posts(&self, auth: Option<&Session>) -> Result<Vec<Post>>;
}

/// The two halves of a backend, ready to hand to the controllers
#[derive(Clone)]
pub struct Backend {
    /// Authentication half
    pub auth: Arc<dyn AuthBackend>,
    /// Document store half
    pub posts: Arc<dyn PostStore>,
    /// Backend type name, for display
    pub kind: &'static str,
}

impl Backend {
    /// Bundle a single value implementing both traits
    pub fn from_shared<B>(backend: Arc<B>, kind: &'static str) -> Self
    where
        B: AuthBackend + PostStore + 'static,
    {
        Self {
            auth: backend.clone(),
            posts: backend,
            kind,
        }
    }
}

/// Create a backend instance based on configuration
///
/// # Arguments
///
/// * `config` - Full configuration (backend section and feed collection)
///
/// # Errors
///
/// Returns error if the backend type is invalid or the HTTP client cannot be built
///
/// # Examples
///
/// ```
/// use blogline::backend::create_backend;
/// use blogline::config::Config;
///
/// let mut config = Config::default();
/// config.backend.backend_type = "memory".to_string();
/// let backend = create_backend(&config).unwrap();
/// assert_eq!(backend.kind, "memory");
/// ```
pub fn create_backend(config: &Config) -> Result<Backend> {
    match config.backend.backend_type.as_str() {
        "firebase" => {
            let backend = FirebaseBackend::new(
                config.backend.firebase.clone(),
                &config.feed.collection,
                std::time::Duration::from_secs(config.backend.timeout_seconds),
            )?;
            Ok(Backend::from_shared(Arc::new(backend), "firebase"))
        }
        "memory" => Ok(Backend::from_shared(
            Arc::new(MemoryBackend::new()),
            "memory",
        )),
        other => Err(BloglineError::Backend(format!("Unknown backend type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_backend() {
        let mut config = Config::default();
        config.backend.backend_type = "memory".to_string();
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.kind, "memory");
    }

    #[test]
    fn test_create_firebase_backend() {
        let mut config = Config::default();
        config.backend.firebase.api_key = "key".to_string();
        config.backend.firebase.project_id = "proj".to_string();
        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.kind, "firebase");
    }

    #[test]
    fn test_create_unknown_backend() {
        let mut config = Config::default();
        config.backend.backend_type = "nope".to_string();
        let result = create_backend(&config);
        assert!(result.is_err());
        assert!(result
            .err()
            .unwrap()
            .to_string()
            .contains("Unknown backend type"));
    }
}
