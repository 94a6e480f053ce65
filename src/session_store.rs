//! Session persistence
//!
//! A signed-in session outlives a single process run: `blogline login`
//! followed by `blogline post ...` must attribute the post. The session is
//! serialized to JSON and kept in the operating system's native credential
//! store (Keychain on macOS, Secret Service on Linux, Windows Credential
//! Manager on Windows).
//!
//! [`MemorySessionStore`] keeps the session for the current process only.
//! It is used when persistence is disabled and with the memory backend.

use crate::backend::Session;
use crate::error::{BloglineError, Result};
use std::sync::{Arc, Mutex};

/// Keyring account under which the session is stored
const KEYRING_ACCOUNT: &str = "current";

/// Storage for the current session between runs
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any
    fn load(&self) -> Result<Option<Session>>;

    /// Replace the stored session
    fn save(&self, session: &Session) -> Result<()>;

    /// Forget the stored session; succeeds when nothing is stored
    fn clear(&self) -> Result<()>;
}

/// Session store backed by the OS keyring
///
/// # Examples
///
/// ```no_run
/// use blogline::session_store::{KeyringSessionStore, SessionStore};
///
/// let store = KeyringSessionStore::new("blogline-session");
/// let session = store.load().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    service: String,
}

impl KeyringSessionStore {
    /// Create a store under the given keyring service name
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Keyring service name
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, KEYRING_ACCOUNT).map_err(BloglineError::Keyring)?)
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        match self.entry()?.get_password() {
            Ok(json_str) => {
                let session: Session = serde_json::from_str(&json_str)?;
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(BloglineError::Keyring(e).into()),
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let json_str = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&json_str)
            .map_err(BloglineError::Keyring)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(BloglineError::Keyring(e).into()),
        }
    }
}

/// Session store living in process memory
///
/// Clones share the same slot, which lets tests stand in for two processes
/// looking at the same keyring entry.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Pick the session store for a configuration
///
/// The keyring is used only when persistence is enabled and the backend
/// itself outlives the process.
pub fn create_session_store(config: &crate::config::Config) -> Arc<dyn SessionStore> {
    if config.session.persist && config.backend.backend_type != "memory" {
        Arc::new(KeyringSessionStore::new(
            config.session.keyring_service.clone(),
        ))
    } else {
        Arc::new(MemorySessionStore::new())
    }
}
