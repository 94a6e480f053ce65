//! Post Feed Controller
//!
//! Holds the loaded feed and the draft, and appends new posts to the
//! [`PostStore`]. Data-access failures are logged and never surfaced as
//! errors: a failed load leaves the feed as it was, a failed submission
//! leaves the draft in place for another try.
//!
//! Only one submission runs at a time; a second one started while the
//! first is in flight returns [`SubmitOutcome::Busy`] without touching the
//! store.

use crate::backend::{NewPost, Post, PostStore, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Client-local post text awaiting submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    text: String,
}

impl Draft {
    /// Current text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Replace the text
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Empty the draft
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// True when there is nothing but whitespace to submit
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Result of a feed load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Feed replaced with this many posts
    Loaded(usize),
    /// Store call failed; feed unchanged
    Failed,
}

/// Result of a post submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored under this id; draft cleared
    Posted {
        /// Store-assigned document id
        id: String,
    },
    /// Draft was empty or whitespace; no store call made
    EmptyDraft,
    /// Another submission is still in flight; no store call made
    Busy,
    /// Store call failed; draft kept
    Failed,
}

/// Feed and draft state for one client
pub struct FeedController {
    store: Arc<dyn PostStore>,
    posts: RwLock<Vec<Post>>,
    draft: Mutex<Draft>,
    submitting: AtomicBool,
    refresh_after_post: bool,
}

/// Clears the in-flight flag when a submission ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FeedController {
    /// Create a controller with an empty feed
    ///
    /// # Arguments
    ///
    /// * `store` - Document store for posts
    /// * `refresh_after_post` - Reload the feed after each successful post
    pub fn new(store: Arc<dyn PostStore>, refresh_after_post: bool) -> Self {
        Self {
            store,
            posts: RwLock::new(Vec::new()),
            draft: Mutex::new(Draft::default()),
            submitting: AtomicBool::new(false),
            refresh_after_post,
        }
    }

    fn draft_guard(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the loaded feed, newest first
    pub fn posts(&self) -> Vec<Post> {
        self.posts
            .read()
            .map(|posts| posts.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Current draft text
    pub fn draft(&self) -> String {
        self.draft_guard().as_str().to_string()
    }

    /// Replace the draft text
    pub fn set_draft(&self, text: impl Into<String>) {
        self.draft_guard().set(text);
    }

    /// Discard the draft
    pub fn clear_draft(&self) {
        self.draft_guard().clear();
    }

    /// Whether a submission is in flight
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Fetch the feed, newest first
    ///
    /// Called once at startup. On failure the error is logged and the
    /// current feed is kept.
    pub async fn load_feed(&self, auth: Option<&Session>) -> LoadOutcome {
        match self.store.query_posts(auth).await {
            Ok(posts) => {
                let count = posts.len();
                match self.posts.write() {
                    Ok(mut guard) => *guard = posts,
                    Err(e) => *e.into_inner() = posts,
                }
                tracing::debug!("Loaded {} posts", count);
                LoadOutcome::Loaded(count)
            }
            Err(e) => {
                tracing::error!("Error fetching posts: {}", e);
                LoadOutcome::Failed
            }
        }
    }

    /// Reload the feed on request
    pub async fn refresh(&self, auth: Option<&Session>) -> LoadOutcome {
        tracing::debug!("Refreshing feed");
        self.load_feed(auth).await
    }

    /// Submit the draft as a new post
    ///
    /// The author is the session's email, or "Anonymous" without one. The
    /// timestamp is left to the store.
    pub async fn submit_post(&self, session: Option<&Session>) -> SubmitOutcome {
        let text = {
            let draft = self.draft_guard();
            if draft.is_blank() {
                tracing::info!("Post content is empty");
                return SubmitOutcome::EmptyDraft;
            }
            draft.as_str().to_string()
        };

        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            tracing::info!("A post is already being submitted");
            return SubmitOutcome::Busy;
        };

        let post = NewPost::attributed(text.clone(), session);
        match self.store.append_post(&post, session).await {
            Ok(id) => {
                {
                    let mut draft = self.draft_guard();
                    // Keep edits made while the write was in flight.
                    if draft.as_str() == text {
                        draft.clear();
                    }
                }
                tracing::info!("Post added successfully: {}", id);
                if self.refresh_after_post {
                    self.load_feed(session).await;
                }
                SubmitOutcome::Posted { id }
            }
            Err(e) => {
                tracing::error!("Error adding post: {}", e);
                SubmitOutcome::Failed
            }
        }
    }
}
