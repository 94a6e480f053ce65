//! Common types shared by the backend traits and the client controllers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author recorded for posts written without a session
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// An authenticated identity
///
/// Produced by sign-up, sign-in, refresh, or restore from the session store.
/// Tokens are opaque to the client; they are only forwarded to the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend user id
    pub uid: String,

    /// Account email, also used as the post author
    pub email: String,

    /// Short-lived token sent on store requests
    pub id_token: String,

    /// Long-lived token used to mint a new `id_token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// UTC instant at which `id_token` stops being accepted
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns `true` when the id token is expired or about to expire
    ///
    /// A 60-second buffer leaves time to refresh before the store rejects
    /// the token. Sessions without `expires_at` never expire.
    ///
    /// # Examples
    ///
    /// ```
    /// use blogline::backend::Session;
    /// use chrono::{Duration, Utc};
    ///
    /// let mut session = Session {
    ///     uid: "u1".to_string(),
    ///     email: "u@x.com".to_string(),
    ///     id_token: "tok".to_string(),
    ///     refresh_token: None,
    ///     expires_at: None,
    /// };
    /// assert!(!session.is_expired());
    ///
    /// session.expires_at = Some(Utc::now() + Duration::seconds(30));
    /// assert!(session.is_expired());
    /// ```
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => Utc::now() >= expires_at - chrono::Duration::seconds(60),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"REDACTED")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "REDACTED"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Creation time of a post as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "at", rename_all = "snake_case")]
pub enum Timestamp {
    /// The store has not resolved the server timestamp yet
    Pending,
    /// Server-assigned creation time
    Assigned(DateTime<Utc>),
    /// Missing or unreadable
    Unknown,
}

impl Timestamp {
    /// The assigned instant, if any
    pub fn assigned(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Assigned(at) => Some(*at),
            _ => None,
        }
    }
}

/// A post as read from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Store-assigned identifier
    pub id: String,
    /// Post text
    pub content: String,
    /// Author email or [`ANONYMOUS_AUTHOR`]
    pub author: String,
    /// Creation time
    pub timestamp: Timestamp,
}

/// A post about to be appended
///
/// Carries no timestamp: the store assigns it at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    /// Post text, as typed
    pub content: String,
    /// Author email or [`ANONYMOUS_AUTHOR`]
    pub author: String,
}

impl NewPost {
    /// Build a post attributed to the session's email, or anonymous
    ///
    /// # Examples
    ///
    /// ```
    /// use blogline::backend::{NewPost, ANONYMOUS_AUTHOR};
    ///
    /// let post = NewPost::attributed("hello", None);
    /// assert_eq!(post.author, ANONYMOUS_AUTHOR);
    /// ```
    pub fn attributed(content: impl Into<String>, session: Option<&Session>) -> Self {
        Self {
            content: content.into(),
            author: session
                .map(|s| s.email.clone())
                .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session(expires_at: Option<DateTime<Utc>>) -> Session {
        Session {
            uid: "uid-1".to_string(),
            email: "u@x.com".to_string(),
            id_token: "secret-id-token".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            expires_at,
        }
    }

    #[test]
    fn test_session_expiry() {
        assert!(!session(None).is_expired());
        assert!(!session(Some(Utc::now() + Duration::hours(1))).is_expired());
        assert!(session(Some(Utc::now() - Duration::seconds(1))).is_expired());
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(None));
        assert!(rendered.contains("u@x.com"));
        assert!(!rendered.contains("secret-id-token"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn test_session_json_keeps_expiry() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_string(&session(Some(at))).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expires_at, Some(at));
        assert_eq!(back.refresh_token.as_deref(), Some("secret-refresh"));
    }

    #[test]
    fn test_new_post_attribution() {
        let signed_in = session(None);
        assert_eq!(NewPost::attributed("hi", Some(&signed_in)).author, "u@x.com");
        assert_eq!(NewPost::attributed("hi", None).author, "Anonymous");
    }

    #[test]
    fn test_timestamp_assigned() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(Timestamp::Assigned(at).assigned(), Some(at));
        assert_eq!(Timestamp::Pending.assigned(), None);
        assert_eq!(Timestamp::Unknown.assigned(), None);
    }
}
