//! Blogline - terminal blogging client library
//!
//! Users sign up or log in, read a feed of short posts, and publish new
//! ones. Accounts, tokens and post storage belong to an external backend;
//! this crate is the client state layer plus thin adapters that talk to it.
//!
//! # Architecture
//!
//! - `backend`: `AuthBackend` and `PostStore` traits, Firebase REST and in-memory implementations
//! - `session`: Session Manager (sign-up, sign-in, sign-out, observers)
//! - `session_store`: Session persistence between runs
//! - `feed`: Post Feed Controller (load, draft, submit)
//! - `app`: Application state owning both controllers and the credential form
//! - `auth_form`, `render`: Login form state and post rendering
//! - `config`, `error`, `cli`, `commands`: Configuration, errors, and the command line
//!
//! # Example
//!
//! ```no_run
//! use blogline::{App, Config};
//! use blogline::backend::create_backend;
//! use blogline::session_store::create_session_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let mut app = App::new(create_backend(&config)?, create_session_store(&config), &config);
//!     app.start().await;
//!     for post in app.posts() {
//!         println!("{}", blogline::render::render_post(&post));
//!     }
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod auth_form;
pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod feed;
pub mod render;
pub mod session;
pub mod session_store;

// Re-export commonly used types
pub use app::{App, Screen, SessionNotice};
pub use backend::{Post, Session, Timestamp};
pub use config::Config;
pub use error::{BloglineError, Result};
pub use feed::{FeedController, SubmitOutcome};
pub use session::{SessionManager, SessionSubscription};
