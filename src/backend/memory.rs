//! In-process backend
//!
//! Keeps accounts, issued tokens and posts in memory and stamps posts with
//! its own clock, so it behaves like a server from the client's point of
//! view. Selected with `backend.type: memory`; also the backend used by the
//! controller tests.

use crate::backend::{AuthBackend, NewPost, Post, PostStore, Session, Timestamp};
use crate::error::{BloglineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const TOKEN_TTL_SECONDS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// refresh token -> email
    refresh_tokens: HashMap<String, String>,
    posts: Vec<Post>,
    last_timestamp: Option<DateTime<Utc>>,
    unavailable: bool,
    append_calls: usize,
    query_calls: usize,
}

/// Backend holding everything in process memory
///
/// # Examples
///
/// ```
/// use blogline::backend::{AuthBackend, MemoryBackend};
///
/// # #[tokio::main]
/// # async fn main() -> blogline::error::Result<()> {
/// let backend = MemoryBackend::new();
/// let session = backend.create_account("u@x.com", "secret1").await?;
/// assert_eq!(session.email, "u@x.com");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate the backend being unreachable
    ///
    /// While set, every call fails as a network error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Revoke every refresh token issued for `email`
    pub fn revoke_sessions(&self, email: &str) {
        let email = normalize_email(email);
        self.state()
            .refresh_tokens
            .retain(|_, owner| *owner != email);
    }

    /// Seed a post with an explicit timestamp state
    pub fn insert_post(&self, content: &str, author: &str, timestamp: Timestamp) -> String {
        let id = new_id();
        self.state().posts.push(Post {
            id: id.clone(),
            content: content.to_string(),
            author: author.to_string(),
            timestamp,
        });
        id
    }

    /// Number of append calls that reached the store
    pub fn append_calls(&self) -> usize {
        self.state().append_calls
    }

    /// Number of query calls that reached the store
    pub fn query_calls(&self) -> usize {
        self.state().query_calls
    }

    fn check_available(state: &State) -> Result<()> {
        if state.unavailable {
            return Err(BloglineError::network_unavailable("memory backend offline").into());
        }
        Ok(())
    }

    fn issue_session(state: &mut State, uid: &str, email: &str) -> Session {
        let refresh_token = new_id();
        state
            .refresh_tokens
            .insert(refresh_token.clone(), email.to_string());
        Session {
            uid: uid.to_string(),
            email: email.to_string(),
            id_token: new_id(),
            refresh_token: Some(refresh_token),
            expires_at: Some(Utc::now() + Duration::seconds(TOKEN_TTL_SECONDS)),
        }
    }

    /// Strictly increasing server clock
    fn next_timestamp(state: &mut State) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match state.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        state.last_timestamp = Some(at);
        at
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn create_account(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.state();
        Self::check_available(&state)?;

        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(BloglineError::auth_from_code("INVALID_EMAIL").into());
        }
        if state.accounts.contains_key(&email) {
            return Err(BloglineError::auth_from_code("EMAIL_EXISTS").into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BloglineError::auth_from_code(
                "WEAK_PASSWORD : Password should be at least 6 characters",
            )
            .into());
        }

        let uid = new_id();
        state.accounts.insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        tracing::debug!(email = %email, "memory backend: account created");

        Ok(Self::issue_session(&mut state, &uid, &email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.state();
        Self::check_available(&state)?;

        let email = normalize_email(email);
        let account = match state.accounts.get(&email) {
            Some(account) if account.password == password => account.clone(),
            _ => return Err(BloglineError::auth_from_code("INVALID_LOGIN_CREDENTIALS").into()),
        };

        Ok(Self::issue_session(&mut state, &account.uid, &email))
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        if let Some(token) = &session.refresh_token {
            self.state().refresh_tokens.remove(token);
        }
        Ok(())
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let state = self.state();
        Self::check_available(&state)?;

        let token = session
            .refresh_token
            .as_ref()
            .ok_or_else(|| BloglineError::auth_from_code("INVALID_REFRESH_TOKEN"))?;
        let email = state
            .refresh_tokens
            .get(token)
            .cloned()
            .ok_or_else(|| BloglineError::auth_from_code("TOKEN_EXPIRED"))?;

        Ok(Session {
            uid: session.uid.clone(),
            email,
            id_token: new_id(),
            refresh_token: session.refresh_token.clone(),
            expires_at: Some(Utc::now() + Duration::seconds(TOKEN_TTL_SECONDS)),
        })
    }
}

#[async_trait]
impl PostStore for MemoryBackend {
    async fn append_post(&self, post: &NewPost, _auth: Option<&Session>) -> Result<String> {
        let mut state = self.state();
        state.append_calls += 1;
        if state.unavailable {
            return Err(BloglineError::Store("memory backend offline".to_string()).into());
        }

        let id = new_id();
        let at = Self::next_timestamp(&mut state);
        state.posts.push(Post {
            id: id.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            timestamp: Timestamp::Assigned(at),
        });
        Ok(id)
    }

    async fn query_posts(&self, _auth: Option<&Session>) -> Result<Vec<Post>> {
        let mut state = self.state();
        state.query_calls += 1;
        if state.unavailable {
            return Err(BloglineError::Store("memory backend offline".to_string()).into());
        }

        let mut posts = state.posts.clone();
        // Unresolved timestamps are the most recent writes.
        posts.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        Ok(posts)
    }
}

fn sort_key(post: &Post) -> (u8, Option<DateTime<Utc>>) {
    match post.timestamp {
        Timestamp::Pending => (2, None),
        Timestamp::Assigned(at) => (1, Some(at)),
        Timestamp::Unknown => (0, None),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;
    use chrono::TimeZone;

    fn auth_kind(err: &anyhow::Error) -> Option<AuthErrorKind> {
        err.downcast_ref::<BloglineError>()
            .and_then(|e| e.auth_kind())
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in_same_identity() {
        let backend = MemoryBackend::new();
        let created = backend.create_account("u@x.com", "secret1").await.unwrap();
        let signed_in = backend.sign_in("u@x.com", "secret1").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
        assert_eq!(signed_in.email, "u@x.com");
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let backend = MemoryBackend::new();
        backend.create_account("u@x.com", "secret1").await.unwrap();
        let err = backend
            .create_account("U@X.com", "secret2")
            .await
            .unwrap_err();
        assert_eq!(auth_kind(&err), Some(AuthErrorKind::EmailAlreadyInUse));
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.create_account("u@x.com", "123").await.unwrap_err();
        assert_eq!(auth_kind(&err), Some(AuthErrorKind::WeakPassword));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let backend = MemoryBackend::new();
        backend.create_account("u@x.com", "secret1").await.unwrap();
        let err = backend.sign_in("u@x.com", "nope").await.unwrap_err();
        assert_eq!(auth_kind(&err), Some(AuthErrorKind::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_unavailable_is_network_error() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        let err = backend.sign_in("u@x.com", "secret1").await.unwrap_err();
        assert_eq!(auth_kind(&err), Some(AuthErrorKind::NetworkUnavailable));
    }

    #[tokio::test]
    async fn test_refresh_after_revoke_fails() {
        let backend = MemoryBackend::new();
        let session = backend.create_account("u@x.com", "secret1").await.unwrap();
        let refreshed = backend.refresh(&session).await.unwrap();
        assert_ne!(refreshed.id_token, session.id_token);

        backend.revoke_sessions("u@x.com");
        let err = backend.refresh(&session).await.unwrap_err();
        assert_eq!(auth_kind(&err), Some(AuthErrorKind::SessionExpired));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_refresh_token() {
        let backend = MemoryBackend::new();
        let session = backend.create_account("u@x.com", "secret1").await.unwrap();
        backend.sign_out(&session).await.unwrap();
        assert!(backend.refresh(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_query_newest_first() {
        let backend = MemoryBackend::new();
        let first = backend
            .append_post(&NewPost::attributed("first", None), None)
            .await
            .unwrap();
        let second = backend
            .append_post(&NewPost::attributed("second", None), None)
            .await
            .unwrap();

        let posts = backend.query_posts(None).await.unwrap();
        assert_eq!(posts[0].id, second);
        assert_eq!(posts[1].id, first);
        assert!(posts[0].timestamp.assigned() > posts[1].timestamp.assigned());
    }

    #[tokio::test]
    async fn test_query_orders_seeded_states() {
        let backend = MemoryBackend::new();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let unknown = backend.insert_post("u", "a", Timestamp::Unknown);
        let old = backend.insert_post("o", "a", Timestamp::Assigned(older));
        let pending = backend.insert_post("p", "a", Timestamp::Pending);
        let new = backend.insert_post("n", "a", Timestamp::Assigned(newer));

        let ids: Vec<String> = backend
            .query_posts(None)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![pending, new, old, unknown]);
    }

    #[tokio::test]
    async fn test_store_counts_calls() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert!(backend
            .append_post(&NewPost::attributed("x", None), None)
            .await
            .is_err());
        assert!(backend.query_posts(None).await.is_err());
        assert_eq!(backend.append_calls(), 1);
        assert_eq!(backend.query_calls(), 1);
    }
}
