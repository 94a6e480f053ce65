//! Session Manager
//!
//! Owns the current [`Session`] and is the only writer of it. Sign-up,
//! sign-in and sign-out go through here, and so do session changes that
//! originate elsewhere: restore on startup, a token the backend refuses to
//! refresh, or another process signing in or out through the shared
//! session store.
//!
//! Observers register with [`SessionManager::observe_session`] and get a
//! [`SessionSubscription`] back. The callback runs on a spawned task fed by
//! a `tokio::sync::watch` channel; dropping or unsubscribing the handle
//! stops it.

use crate::backend::{AuthBackend, Session};
use crate::error::{AuthErrorKind, BloglineError, Result};
use crate::session_store::SessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tracks the authenticated identity
pub struct SessionManager {
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<Option<Session>>,
    // False while the store may not hold what `state` holds (a failed save
    // or clear). The store is only read as ground truth while this is set.
    store_in_sync: AtomicBool,
}

/// Handle for an active session observer
///
/// The observer stops when the handle is dropped or
/// [`unsubscribe`](Self::unsubscribe)d.
#[derive(Debug)]
pub struct SessionSubscription {
    task: JoinHandle<()>,
}

impl SessionSubscription {
    /// Stop delivering session changes
    pub fn unsubscribe(self) {
        // Drop aborts the task.
    }

    /// Whether the observer task is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reject empty credentials before any backend call
fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(BloglineError::Validation("Email is required".to_string()).into());
    }
    if password.is_empty() {
        return Err(BloglineError::Validation("Password is required".to_string()).into());
    }
    Ok(())
}

impl SessionManager {
    /// Create a manager with no session
    ///
    /// Call [`restore`](Self::restore) to pick up a persisted session.
    pub fn new(auth: Arc<dyn AuthBackend>, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            auth,
            store,
            state,
            store_in_sync: AtomicBool::new(true),
        }
    }

    /// The current session, if signed in
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// Whether a session is present
    pub fn is_signed_in(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Create an account and sign in as it
    ///
    /// # Errors
    ///
    /// Returns [`BloglineError::Validation`] for empty inputs (no backend
    /// call) or the backend's [`BloglineError::Authentication`] error.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        validate_credentials(email, password)?;
        let session = self.auth.create_account(email.trim(), password).await?;
        tracing::info!("User signed up: {}", session.email);
        self.establish(session.clone());
        Ok(session)
    }

    /// Sign in to an existing account
    ///
    /// # Errors
    ///
    /// Returns [`BloglineError::Validation`] for empty inputs (no backend
    /// call) or the backend's [`BloglineError::Authentication`] error.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        validate_credentials(email, password)?;
        let session = self.auth.sign_in(email.trim(), password).await?;
        tracing::info!("User logged in: {}", session.email);
        self.establish(session.clone());
        Ok(session)
    }

    /// Sign out
    ///
    /// A no-op when already signed out. The local session is cleared even if
    /// the backend call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.current() else {
            tracing::debug!("Sign out requested with no session");
            return Ok(());
        };

        if let Err(e) = self.auth.sign_out(&session).await {
            tracing::warn!("Backend sign out failed: {}", e);
        }
        self.clear_local();
        tracing::info!("User logged out");
        Ok(())
    }

    /// Register an observer for session changes
    ///
    /// The callback is invoked with the current session right away and
    /// again after every transition. Must be called inside a tokio runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use blogline::backend::MemoryBackend;
    /// use blogline::session::SessionManager;
    /// use blogline::session_store::MemorySessionStore;
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let manager = SessionManager::new(
    ///     Arc::new(MemoryBackend::new()),
    ///     Arc::new(MemorySessionStore::new()),
    /// );
    /// let subscription = manager.observe_session(|session| {
    ///     println!("signed in: {}", session.is_some());
    /// });
    /// subscription.unsubscribe();
    /// # }
    /// ```
    pub fn observe_session<F>(&self, callback: F) -> SessionSubscription
    where
        F: Fn(Option<&Session>) + Send + 'static,
    {
        let mut rx = self.state.subscribe();
        let task = tokio::spawn(async move {
            loop {
                let current = rx.borrow_and_update().clone();
                callback(current.as_ref());
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        SessionSubscription { task }
    }

    /// Restore the persisted session on startup
    ///
    /// An expired session is refreshed first. Observers always receive the
    /// outcome, including "no session".
    pub async fn restore(&self) -> Option<Session> {
        let stored = match self.store.load() {
            Ok(stored) => {
                self.store_in_sync.store(true, Ordering::SeqCst);
                stored
            }
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                None
            }
        };

        let restored = match stored {
            Some(session) if session.is_expired() => self.refresh_or_drop(session).await,
            other => other,
        };

        if let Some(session) = &restored {
            tracing::info!("Restored session for {}", session.email);
        }
        self.state.send_replace(restored.clone());
        restored
    }

    /// The current session, reconciled with persistence and refreshed
    ///
    /// Picks up sign-ins and sign-outs done by other processes through the
    /// session store, and refreshes an expired id token. A refresh the
    /// backend rejects ends the session; any other refresh failure keeps it.
    ///
    /// While this process's last write to the store has not landed, the
    /// store is not consulted: the write is retried and the local session
    /// stands.
    pub async fn fresh_session(&self) -> Option<Session> {
        if !self.store_in_sync.load(Ordering::SeqCst) {
            self.sync_store();
            let session = self.current()?;
            return self.refresh_if_expired(session).await;
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                return self.current();
            }
        };

        let current = self.current();
        let session = match (current, stored) {
            (Some(_), None) => {
                tracing::info!("Session ended elsewhere");
                self.state.send_replace(None);
                return None;
            }
            (None, Some(stored)) => {
                tracing::info!("Session started elsewhere for {}", stored.email);
                self.state.send_replace(Some(stored.clone()));
                stored
            }
            (Some(current), Some(stored)) => {
                if current.uid != stored.uid || current.id_token != stored.id_token {
                    self.state.send_replace(Some(stored.clone()));
                    stored
                } else {
                    current
                }
            }
            (None, None) => return None,
        };

        self.refresh_if_expired(session).await
    }

    /// End the session because of an external event
    ///
    /// Used when the backend revokes the session. A no-op when signed out.
    pub fn invalidate(&self, reason: &str) {
        if self.current().is_none() {
            return;
        }
        tracing::warn!("Session invalidated: {}", reason);
        self.clear_local();
    }

    async fn refresh_if_expired(&self, session: Session) -> Option<Session> {
        if !session.is_expired() {
            return Some(session);
        }

        match self.auth.refresh(&session).await {
            Ok(refreshed) => {
                tracing::debug!("Refreshed id token for {}", refreshed.email);
                self.establish(refreshed.clone());
                Some(refreshed)
            }
            Err(e) if is_rejected_refresh(&e) => {
                self.invalidate(&e.to_string());
                None
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, keeping session: {}", e);
                Some(session)
            }
        }
    }

    async fn refresh_or_drop(&self, session: Session) -> Option<Session> {
        match self.auth.refresh(&session).await {
            Ok(refreshed) => {
                self.persist(&refreshed);
                Some(refreshed)
            }
            Err(e) if is_rejected_refresh(&e) => {
                tracing::warn!("Stored session could not be refreshed: {}", e);
                self.record_sync(self.store.clear(), "clear");
                None
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, keeping stored session: {}", e);
                Some(session)
            }
        }
    }

    fn establish(&self, session: Session) {
        self.persist(&session);
        self.state.send_replace(Some(session));
    }

    fn persist(&self, session: &Session) {
        self.record_sync(self.store.save(session), "persist");
    }

    fn clear_local(&self) {
        self.record_sync(self.store.clear(), "clear");
        self.state.send_replace(None);
    }

    /// Write the local state to the store again after a failed write
    fn sync_store(&self) {
        let result = match self.current() {
            Some(session) => self.store.save(&session),
            None => self.store.clear(),
        };
        if result.is_ok() {
            tracing::debug!("Stored session back in sync");
        }
        self.record_sync(result, "sync");
    }

    fn record_sync(&self, result: Result<()>, action: &str) {
        match result {
            Ok(()) => self.store_in_sync.store(true, Ordering::SeqCst),
            Err(e) => {
                tracing::warn!("Could not {} stored session: {}", action, e);
                self.store_in_sync.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// Whether the backend refused to refresh the session
///
/// Only a revoked or expired token, or a disabled or deleted account, ends
/// the session. Outages, throttling and malformed replies do not.
fn is_rejected_refresh(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<BloglineError>() {
        Some(BloglineError::Authentication { kind, code, .. }) => {
            matches!(
                kind,
                AuthErrorKind::SessionExpired | AuthErrorKind::UserDisabled
            ) || code.split(" : ").next().map(str::trim) == Some("USER_NOT_FOUND")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::session_store::MemorySessionStore;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Session store whose writes can be made to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySessionStore,
        fail_saves: AtomicBool,
    }

    impl SessionStore for FlakyStore {
        fn load(&self) -> Result<Option<Session>> {
            self.inner.load()
        }

        fn save(&self, session: &Session) -> Result<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(BloglineError::Store("keyring locked".to_string()).into());
            }
            self.inner.save(session)
        }

        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }
    }

    /// Auth backend whose refresh always fails with a fixed error
    struct FailingRefresh {
        inner: MemoryBackend,
        error: fn() -> anyhow::Error,
    }

    #[async_trait]
    impl AuthBackend for FailingRefresh {
        async fn create_account(&self, email: &str, password: &str) -> Result<Session> {
            self.inner.create_account(email, password).await
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
            self.inner.sign_in(email, password).await
        }

        async fn sign_out(&self, session: &Session) -> Result<()> {
            self.inner.sign_out(session).await
        }

        async fn refresh(&self, _session: &Session) -> Result<Session> {
            Err((self.error)())
        }
    }

    /// Manager holding an expired session whose refresh fails with `error`
    async fn expired_session_manager(
        error: fn() -> anyhow::Error,
    ) -> (SessionManager, MemorySessionStore) {
        let backend = Arc::new(FailingRefresh {
            inner: MemoryBackend::new(),
            error,
        });
        let store = MemorySessionStore::new();
        let manager = SessionManager::new(backend.clone(), Arc::new(store.clone()));
        let mut session = backend.create_account("u@x.com", "secret1").await.unwrap();
        session.expires_at = Some(Utc::now() - Duration::minutes(1));
        store.save(&session).unwrap();
        (manager, store)
    }

    fn manager() -> (SessionManager, Arc<MemoryBackend>, MemorySessionStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = MemorySessionStore::new();
        let manager = SessionManager::new(backend.clone(), Arc::new(store.clone()));
        (manager, backend, store)
    }

    async fn next_email(rx: &mut mpsc::UnboundedReceiver<Option<String>>) -> Option<String> {
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("observer timed out")
            .expect("observer channel closed")
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in_matches_identity() {
        let (manager, _, _) = manager();
        let created = manager.sign_up("u@x.com", "secret1").await.unwrap();
        manager.sign_out().await.unwrap();
        let signed_in = manager.sign_in("u@x.com", "secret1").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
        assert_eq!(manager.current().unwrap().email, "u@x.com");
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected_locally() {
        let (manager, backend, _) = manager();
        backend.set_unavailable(true);

        let err = manager.sign_in("  ", "secret1").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BloglineError>(),
            Some(BloglineError::Validation(_))
        ));

        let err = manager.sign_up("u@x.com", "").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BloglineError>(),
            Some(BloglineError::Validation(_))
        ));
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_failed_sign_in_stays_signed_out() {
        let (manager, _, _) = manager();
        let err = manager.sign_in("u@x.com", "secret1").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BloglineError>()
                .and_then(BloglineError::auth_kind),
            Some(AuthErrorKind::InvalidCredentials)
        );
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let (manager, _, store) = manager();
        manager.sign_up("u@x.com", "secret1").await.unwrap();

        manager.sign_out().await.unwrap();
        assert!(manager.current().is_none());
        manager.sign_out().await.unwrap();
        assert!(manager.current().is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_persists_session() {
        let (manager, _, store) = manager();
        manager.sign_up("u@x.com", "secret1").await.unwrap();
        assert_eq!(store.load().unwrap().unwrap().email, "u@x.com");
    }

    #[tokio::test]
    async fn test_observer_sees_initial_and_transitions() {
        let (manager, _, _) = manager();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = manager.observe_session(move |s| {
            let _ = tx.send(s.map(|s| s.email.clone()));
        });

        assert_eq!(next_email(&mut rx).await, None);

        manager.sign_up("u@x.com", "secret1").await.unwrap();
        assert_eq!(next_email(&mut rx).await, Some("u@x.com".to_string()));

        manager.sign_out().await.unwrap();
        assert_eq!(next_email(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_observation_after_sign_out_yields_none() {
        let (manager, _, _) = manager();
        manager.sign_up("u@x.com", "secret1").await.unwrap();
        manager.sign_out().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = manager.observe_session(move |s| {
            let _ = tx.send(s.map(|s| s.email.clone()));
        });
        assert_eq!(next_email(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (manager, _, _) = manager();
        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        let subscription = manager.observe_session(move |_| {
            *counter.lock().unwrap() += 1;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(subscription.is_active());
        subscription.unsubscribe();
        tokio::task::yield_now().await;

        let before = *seen.lock().unwrap();
        manager.sign_up("u@x.com", "secret1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().unwrap(), before);
    }

    #[tokio::test]
    async fn test_restore_publishes_stored_session() {
        let (manager, backend, store) = manager();
        let session = backend.create_account("u@x.com", "secret1").await.unwrap();
        store.save(&session).unwrap();

        let restored = manager.restore().await;
        assert_eq!(restored.unwrap().email, "u@x.com");
        assert!(manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_restore_refreshes_expired_session() {
        let (manager, backend, store) = manager();
        let mut session = backend.create_account("u@x.com", "secret1").await.unwrap();
        session.expires_at = Some(Utc::now() - Duration::minutes(5));
        store.save(&session).unwrap();

        let restored = manager.restore().await.unwrap();
        assert!(!restored.is_expired());
        assert_ne!(restored.id_token, session.id_token);
    }

    #[tokio::test]
    async fn test_restore_drops_revoked_session() {
        let (manager, backend, store) = manager();
        let mut session = backend.create_account("u@x.com", "secret1").await.unwrap();
        session.expires_at = Some(Utc::now() - Duration::minutes(5));
        store.save(&session).unwrap();
        backend.revoke_sessions("u@x.com");

        assert!(manager.restore().await.is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fresh_session_detects_sign_out_elsewhere() {
        let (manager, backend, store) = manager();
        let other = SessionManager::new(backend.clone(), Arc::new(store.clone()));

        manager.sign_up("u@x.com", "secret1").await.unwrap();
        other.restore().await;
        other.sign_out().await.unwrap();

        assert!(manager.fresh_session().await.is_none());
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_fresh_session_adopts_sign_in_elsewhere() {
        let (manager, backend, store) = manager();
        let other = SessionManager::new(backend.clone(), Arc::new(store.clone()));

        other.sign_up("u@x.com", "secret1").await.unwrap();
        assert!(!manager.is_signed_in());
        assert_eq!(manager.fresh_session().await.unwrap().email, "u@x.com");
    }

    #[tokio::test]
    async fn test_fresh_session_invalidates_on_revoked_refresh() {
        let (manager, backend, store) = manager();
        let mut session = manager.sign_up("u@x.com", "secret1").await.unwrap();
        session.expires_at = Some(Utc::now() - Duration::minutes(1));
        store.save(&session).unwrap();
        manager.state.send_replace(Some(session));
        backend.revoke_sessions("u@x.com");

        assert!(manager.fresh_session().await.is_none());
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_fresh_session_keeps_session_when_offline() {
        let (manager, backend, store) = manager();
        let mut session = manager.sign_up("u@x.com", "secret1").await.unwrap();
        session.expires_at = Some(Utc::now() - Duration::minutes(1));
        store.save(&session).unwrap();
        manager.state.send_replace(Some(session));
        backend.set_unavailable(true);

        assert_eq!(manager.fresh_session().await.unwrap().email, "u@x.com");
    }

    #[tokio::test]
    async fn test_invalidate_when_signed_out_is_noop() {
        let (manager, _, _) = manager();
        manager.invalidate("token revoked");
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_restore_keeps_session_on_server_error() {
        let (manager, store) =
            expired_session_manager(|| BloglineError::auth_from_code("HTTP_503").into()).await;

        assert_eq!(manager.restore().await.unwrap().email, "u@x.com");
        assert!(manager.is_signed_in());
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_session_keeps_session_on_malformed_reply() {
        let (manager, store) = expired_session_manager(|| {
            BloglineError::Backend("Failed to parse refresh response".to_string()).into()
        })
        .await;
        manager.restore().await;

        assert_eq!(manager.fresh_session().await.unwrap().email, "u@x.com");
        assert!(manager.is_signed_in());
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_session_ends_for_disabled_account() {
        let (manager, store) =
            expired_session_manager(|| BloglineError::auth_from_code("USER_DISABLED").into())
                .await;
        manager.state.send_replace(store.load().unwrap());

        assert!(manager.fresh_session().await.is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_drops_deleted_account() {
        let (manager, store) =
            expired_session_manager(|| BloglineError::auth_from_code("USER_NOT_FOUND").into())
                .await;

        assert!(manager.restore().await.is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_persist_is_not_a_sign_out() {
        let store = Arc::new(FlakyStore::default());
        store.fail_saves.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(Arc::new(MemoryBackend::new()), store.clone());

        manager.sign_up("u@x.com", "secret1").await.unwrap();
        assert!(store.load().unwrap().is_none());

        assert_eq!(manager.fresh_session().await.unwrap().email, "u@x.com");
        assert!(manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_failed_persist_does_not_adopt_older_session() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(FlakyStore::default());
        let older = backend.create_account("old@x.com", "secret1").await.unwrap();
        store.inner.save(&older).unwrap();
        store.fail_saves.store(true, Ordering::SeqCst);

        let manager = SessionManager::new(backend, store.clone());
        manager.sign_up("u@x.com", "secret1").await.unwrap();

        assert_eq!(manager.fresh_session().await.unwrap().email, "u@x.com");
        assert_eq!(store.load().unwrap().unwrap().email, "old@x.com");
    }

    #[tokio::test]
    async fn test_store_resyncs_after_save_recovers() {
        let store = Arc::new(FlakyStore::default());
        store.fail_saves.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(Arc::new(MemoryBackend::new()), store.clone());
        manager.sign_up("u@x.com", "secret1").await.unwrap();

        store.fail_saves.store(false, Ordering::SeqCst);
        assert!(manager.fresh_session().await.is_some());
        assert_eq!(store.load().unwrap().unwrap().email, "u@x.com");

        // Back in sync: a sign-out elsewhere is honoured again.
        store.clear().unwrap();
        assert!(manager.fresh_session().await.is_none());
    }

    #[tokio::test]
    async fn test_observer_may_call_back_into_manager() {
        let (manager, _, _) = manager();
        let manager = Arc::new(manager);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inner = manager.clone();
        let _subscription = manager.observe_session(move |session| {
            if session.is_some() {
                inner.invalidate("observer");
            }
            let _ = tx.send(session.map(|s| s.email.clone()));
        });

        assert_eq!(next_email(&mut rx).await, None);
        manager.sign_up("u@x.com", "secret1").await.unwrap();
        assert_eq!(next_email(&mut rx).await, Some("u@x.com".to_string()));
        assert_eq!(next_email(&mut rx).await, None);
        assert!(!manager.is_signed_in());
    }
}
