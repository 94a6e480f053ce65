//! Firebase backend implementation for Blogline
//!
//! Talks to a Firebase project over its public REST surface:
//!
//! - Identity Toolkit (`accounts:signUp`, `accounts:signInWithPassword`)
//!   for email/password accounts
//! - Secure Token (`token`) for refreshing id tokens
//! - Firestore (`documents:runQuery`, `documents:commit`) for the post
//!   collection
//!
//! Post documents hold `content`, `user` and `timestamp`. The timestamp is
//! written with a `REQUEST_TIME` server transform so the store, not the
//! client clock, decides ordering.

use crate::backend::{AuthBackend, NewPost, Post, PostStore, Session, Timestamp, ANONYMOUS_AUTHOR};
use crate::config::FirebaseConfig;
use crate::error::{BloglineError, Result};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

/// Firebase REST backend
///
/// # Examples
///
/// ```no_run
/// use blogline::backend::{AuthBackend, FirebaseBackend};
/// use blogline::config::FirebaseConfig;
/// use std::time::Duration;
///
/// # async fn example() -> blogline::error::Result<()> {
/// let config = FirebaseConfig {
///     api_key: "AIza...".to_string(),
///     project_id: "my-blog".to_string(),
///     ..Default::default()
/// };
/// let backend = FirebaseBackend::new(config, "posts", Duration::from_secs(30))?;
/// let session = backend.sign_in("u@x.com", "secret1").await?;
/// # Ok(())
/// # }
/// ```
pub struct FirebaseBackend {
    client: Client,
    config: FirebaseConfig,
    collection: String,
}

/// Response from `accounts:signUp` and `accounts:signInWithPassword`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Response from the Secure Token `token` endpoint
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// One element of a `runQuery` response
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

/// Firestore document
#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

impl FirebaseBackend {
    /// Create a new Firebase backend
    ///
    /// # Arguments
    ///
    /// * `config` - Project identifiers and endpoints
    /// * `collection` - Collection holding the posts
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: FirebaseConfig, collection: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blogline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BloglineError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Firebase backend: project={}, collection={}",
            config.project_id,
            collection
        );

        Ok(Self {
            client,
            config,
            collection: collection.to_string(),
        })
    }

    fn endpoint(base: &str, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", base.trim_end_matches('/'), path);
        Url::parse(&raw)
            .map_err(|e| BloglineError::Config(format!("Invalid endpoint {}: {}", raw, e)).into())
    }

    fn identity_url(&self, method: &str) -> Result<Url> {
        let mut url = Self::endpoint(
            &self.config.auth_endpoint,
            &format!("v1/accounts:{}", method),
        )?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    fn token_url(&self) -> Result<Url> {
        let mut url = Self::endpoint(&self.config.token_endpoint, "v1/token")?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.config.project_id, self.config.database
        )
    }

    fn documents_url(&self, action: &str) -> Result<Url> {
        Self::endpoint(
            &self.config.firestore_endpoint,
            &format!("v1/{}/documents:{}", self.database_path(), action),
        )
    }

    fn document_name(&self, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_path(), self.collection, id)
    }

    fn with_auth(request: RequestBuilder, auth: Option<&Session>) -> RequestBuilder {
        match auth {
            Some(session) => request.bearer_auth(&session.id_token),
            None => request,
        }
    }

    /// Send an auth request, mapping transport failures to network-unavailable
    async fn send_auth(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("Auth request failed: {}", e);
            if e.is_connect() || e.is_timeout() || e.is_request() {
                BloglineError::network_unavailable(e)
            } else {
                BloglineError::Http(e)
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let code = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP_{}", status.as_u16()));
        tracing::debug!("Auth endpoint returned {}: {}", status, code);
        Err(BloglineError::auth_from_code(&code).into())
    }

    async fn store_error(response: Response) -> BloglineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => match envelope.error.status {
                Some(code) => format!("{} {}", code, envelope.error.message),
                None => envelope.error.message,
            },
            Err(_) => body,
        };
        BloglineError::Store(format!("Firestore returned {}: {}", status, detail))
    }

    async fn password_auth(&self, method: &str, email: &str, password: &str) -> Result<Session> {
        let url = self.identity_url(method)?;
        tracing::debug!("Calling identity endpoint accounts:{}", method);

        let body = json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let response = Self::send_auth(self.client.post(url).json(&body)).await?;
        let parsed: PasswordAuthResponse = response.json().await.map_err(|e| {
            BloglineError::Backend(format!("Failed to parse identity response: {}", e))
        })?;

        Ok(Session {
            uid: parsed.local_id,
            email: if parsed.email.is_empty() {
                email.to_string()
            } else {
                parsed.email
            },
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            expires_at: Some(expiry_from(parsed.expires_in.as_deref())),
        })
    }
}

#[async_trait]
impl AuthBackend for FirebaseBackend {
    async fn create_account(&self, email: &str, password: &str) -> Result<Session> {
        self.password_auth("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.password_auth("signInWithPassword", email, password).await
    }

    async fn sign_out(&self, _session: &Session) -> Result<()> {
        // Firebase sessions are client-side; dropping the tokens is enough.
        Ok(())
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| BloglineError::auth_from_code("INVALID_REFRESH_TOKEN"))?;

        let url = self.token_url()?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = Self::send_auth(self.client.post(url).form(&form)).await?;
        let parsed: RefreshResponse = response.json().await.map_err(|e| {
            BloglineError::Backend(format!("Failed to parse token response: {}", e))
        })?;

        Ok(Session {
            uid: parsed.user_id.unwrap_or_else(|| session.uid.clone()),
            email: session.email.clone(),
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token.or_else(|| session.refresh_token.clone()),
            expires_at: Some(expiry_from(parsed.expires_in.as_deref())),
        })
    }
}

#[async_trait]
impl PostStore for FirebaseBackend {
    async fn append_post(&self, post: &NewPost, auth: Option<&Session>) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let body = json!({
            "writes": [{
                "update": {
                    "name": self.document_name(&id),
                    "fields": {
                        "content": { "stringValue": post.content },
                        "user": { "stringValue": post.author },
                    },
                },
                "updateTransforms": [{
                    "fieldPath": "timestamp",
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }],
        });

        let url = self.documents_url("commit")?;
        let response = Self::with_auth(self.client.post(url), auth)
            .json(&body)
            .send()
            .await
            .map_err(BloglineError::from)?;

        if !response.status().is_success() {
            return Err(Self::store_error(response).await.into());
        }

        tracing::debug!(id = %id, "Appended post");
        Ok(id)
    }

    async fn query_posts(&self, auth: Option<&Session>) -> Result<Vec<Post>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "orderBy": [{
                    "field": { "fieldPath": "timestamp" },
                    "direction": "DESCENDING",
                }],
            },
        });

        let url = self.documents_url("runQuery")?;
        let response = Self::with_auth(self.client.post(url), auth)
            .json(&body)
            .send()
            .await
            .map_err(BloglineError::from)?;

        if !response.status().is_success() {
            return Err(Self::store_error(response).await.into());
        }

        let items: Vec<RunQueryItem> = response.json().await.map_err(|e| {
            BloglineError::Store(format!("Failed to parse query response: {}", e))
        })?;

        let posts: Vec<Post> = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(document_to_post)
            .collect();
        tracing::debug!("Fetched {} posts", posts.len());
        Ok(posts)
    }
}

fn expiry_from(expires_in: Option<&str>) -> DateTime<Utc> {
    let seconds = expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
    Utc::now() + chrono::Duration::seconds(seconds)
}

fn string_field(fields: &HashMap<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Read the timestamp field into its three states
fn timestamp_field(fields: &HashMap<String, Value>) -> Timestamp {
    let Some(value) = fields.get("timestamp") else {
        return Timestamp::Unknown;
    };

    if let Some(raw) = value.get("timestampValue").and_then(Value::as_str) {
        return DateTime::parse_from_rfc3339(raw)
            .map(|at| Timestamp::Assigned(at.with_timezone(&Utc)))
            .unwrap_or(Timestamp::Unknown);
    }

    if value.get("nullValue").is_some() {
        return Timestamp::Pending;
    }

    Timestamp::Unknown
}

fn document_to_post(document: Document) -> Post {
    let id = document
        .name
        .rsplit('/')
        .next()
        .unwrap_or(&document.name)
        .to_string();

    Post {
        id,
        content: string_field(&document.fields, "content").unwrap_or_default(),
        author: string_field(&document.fields, "user")
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
        timestamp: timestamp_field(&document.fields),
    }
}
