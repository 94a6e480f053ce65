//! Credential form state
//!
//! The login screen collects an email and a password and submits them
//! either as a sign-in or as a sign-up. Which one is a property of the form,
//! not of the session.

use crate::error::{BloglineError, Result};
use colored::Colorize;
use std::fmt;

/// Intent of the credential form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Sign in to an existing account
    #[default]
    SignIn,

    /// Create a new account
    SignUp,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignIn => write!(f, "LOGIN"),
            Self::SignUp => write!(f, "SIGNUP"),
        }
    }
}

impl AuthMode {
    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            Self::SignIn => Self::SignUp,
            Self::SignUp => Self::SignIn,
        }
    }

    /// Label for the submit action
    ///
    /// # Examples
    ///
    /// ```
    /// use blogline::auth_form::AuthMode;
    ///
    /// assert_eq!(AuthMode::SignUp.action_label(), "Sign Up");
    /// ```
    pub fn action_label(&self) -> &'static str {
        match self {
            Self::SignIn => "Login",
            Self::SignUp => "Sign Up",
        }
    }

    /// Hint offering the other mode
    pub fn toggle_hint(&self) -> &'static str {
        match self {
            Self::SignIn => "Need an account? Sign up (/toggle)",
            Self::SignUp => "Already have an account? Login (/toggle)",
        }
    }

    /// Colored tag for the prompt
    pub fn colored_tag(&self) -> String {
        match self {
            Self::SignIn => format!("[{}]", "LOGIN".cyan()),
            Self::SignUp => format!("[{}]", "SIGNUP".yellow()),
        }
    }
}

/// Email and password being entered, plus the form intent
#[derive(Clone, Default)]
pub struct CredentialForm {
    /// Entered email
    pub email: String,
    /// Entered password
    pub password: String,
    mode: AuthMode,
}

impl fmt::Debug for CredentialForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialForm")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("mode", &self.mode)
            .finish()
    }
}

impl CredentialForm {
    /// Empty form in sign-in mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Current intent
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Flip between sign-in and sign-up; entered values are kept
    pub fn toggle_mode(&mut self) -> AuthMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Set the intent directly
    pub fn set_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
    }

    /// Fill both fields
    pub fn fill(&mut self, email: impl Into<String>, password: impl Into<String>) {
        self.email = email.into();
        self.password = password.into();
    }

    /// Reset both fields, keeping the mode
    pub fn clear(&mut self) {
        self.email.clear();
        self.password.clear();
    }

    /// Check that both fields are filled
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(BloglineError::Validation("Email is required".to_string()).into());
        }
        if self.password.is_empty() {
            return Err(BloglineError::Validation("Password is required".to_string()).into());
        }
        Ok(())
    }
}
