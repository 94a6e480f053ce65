//! Application state
//!
//! [`App`] owns everything the interactive client shows: the session, the
//! feed with its draft, and the credential form. Front ends read from it
//! through accessors and drive it through its methods; there is no other
//! shared state.

use crate::auth_form::{AuthMode, CredentialForm};
use crate::backend::{Backend, Post, Session};
use crate::config::Config;
use crate::error::Result;
use crate::feed::{FeedController, LoadOutcome, SubmitOutcome};
use crate::session::{SessionManager, SessionSubscription};
use crate::session_store::SessionStore;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What the client should display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Credential form, in the given mode
    Login {
        /// Sign-in or sign-up
        mode: AuthMode,
    },
    /// Feed and post composer for a signed-in user
    Feed {
        /// Signed-in email
        email: String,
    },
}

/// A session transition observed after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// A session started (here or in another process)
    SignedIn(String),
    /// The session ended (sign-out, revocation, or another process)
    SignedOut,
}

/// Client state controller
pub struct App {
    sessions: SessionManager,
    feed: FeedController,
    form: CredentialForm,
    backend_kind: &'static str,
    subscription: Option<SessionSubscription>,
    started: bool,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
    notice_rx: mpsc::UnboundedReceiver<SessionNotice>,
}

impl App {
    /// Build the client over a backend and a session store
    pub fn new(backend: Backend, store: Arc<dyn SessionStore>, config: &Config) -> Self {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        Self {
            sessions: SessionManager::new(backend.auth, store),
            feed: FeedController::new(backend.posts, config.feed.refresh_after_post),
            form: CredentialForm::new(),
            backend_kind: backend.kind,
            subscription: None,
            started: false,
            notice_tx,
            notice_rx,
        }
    }

    /// Restore the session, start observing it and load the feed
    ///
    /// Only the first call does anything, even after [`shutdown`](Self::shutdown).
    pub async fn start(&mut self) {
        if self.started {
            tracing::debug!("App already started");
            return;
        }
        self.started = true;

        self.sessions.restore().await;

        let last = Mutex::new(self.sessions.current().map(|s| s.email));
        let tx = self.notice_tx.clone();
        self.subscription = Some(self.sessions.observe_session(move |session| {
            let email = session.map(|s| s.email.clone());
            let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
            if *last == email {
                return;
            }
            let notice = match &email {
                Some(email) => SessionNotice::SignedIn(email.clone()),
                None => SessionNotice::SignedOut,
            };
            *last = email;
            let _ = tx.send(notice);
        }));

        let session = self.sessions.current();
        self.feed.load_feed(session.as_ref()).await;
        tracing::info!("Started with {} backend", self.backend_kind);
    }

    /// Whether the client is running: started and not shut down
    pub fn is_started(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop observing the session
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::debug!("Session observer stopped");
        }
    }

    /// Login form when signed out, feed when signed in
    pub fn screen(&self) -> Screen {
        match self.sessions.current() {
            Some(session) => Screen::Feed {
                email: session.email,
            },
            None => Screen::Login {
                mode: self.form.mode(),
            },
        }
    }

    /// Backend type name
    pub fn backend_kind(&self) -> &'static str {
        self.backend_kind
    }

    /// The session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The feed controller
    pub fn feed(&self) -> &FeedController {
        &self.feed
    }

    /// The credential form
    pub fn form(&self) -> &CredentialForm {
        &self.form
    }

    /// The credential form, for editing
    pub fn form_mut(&mut self) -> &mut CredentialForm {
        &mut self.form
    }

    /// Submit the credential form in its current mode
    ///
    /// Clears the form on success. On failure the form keeps its values and
    /// the returned error carries a human-readable message.
    pub async fn submit_credentials(&mut self) -> Result<Session> {
        self.form.validate()?;
        let result = match self.form.mode() {
            AuthMode::SignIn => {
                self.sessions
                    .sign_in(&self.form.email, &self.form.password)
                    .await
            }
            AuthMode::SignUp => {
                self.sessions
                    .sign_up(&self.form.email, &self.form.password)
                    .await
            }
        };

        match result {
            Ok(session) => {
                self.form.clear();
                Ok(session)
            }
            Err(e) => {
                match self.form.mode() {
                    AuthMode::SignIn => tracing::error!("Error logging in: {}", e),
                    AuthMode::SignUp => tracing::error!("Error signing up: {}", e),
                }
                Err(e)
            }
        }
    }

    /// Sign out; a no-op when signed out
    pub async fn sign_out(&self) -> Result<()> {
        self.sessions.sign_out().await
    }

    /// Replace the draft text
    pub fn set_draft(&self, text: impl Into<String>) {
        self.feed.set_draft(text);
    }

    /// Current draft text
    pub fn draft(&self) -> String {
        self.feed.draft()
    }

    /// Submit the draft, attributed to the freshly reconciled session
    pub async fn submit_post(&self) -> SubmitOutcome {
        let session = self.sessions.fresh_session().await;
        self.feed.submit_post(session.as_ref()).await
    }

    /// Reload the feed
    pub async fn refresh_feed(&self) -> LoadOutcome {
        let session = self.sessions.fresh_session().await;
        self.feed.refresh(session.as_ref()).await
    }

    /// Loaded posts, newest first
    pub fn posts(&self) -> Vec<Post> {
        self.feed.posts()
    }

    /// Session transitions observed since the last call
    pub fn drain_notices(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notice_rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// Wait for the next session transition
    pub async fn next_notice(&mut self) -> Option<SessionNotice> {
        self.notice_rx.recv().await
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
