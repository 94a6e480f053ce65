//! Command-line interface definition for Blogline
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the interactive client plus one-shot account and post commands.

use clap::{Parser, Subcommand};

/// Blogline - terminal blogging client
///
/// The one-line help text comes from the package description.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "blogline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to config/config.yaml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    /// Override the backend from config (firebase, memory)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Command to execute (defaults to the interactive client)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for Blogline
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the interactive client
    App,

    /// Create an account and sign in
    Signup {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "BLOGLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in to an existing account
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "BLOGLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Print the feed, newest first
    Feed {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Publish a post as the signed-in account (or anonymously)
    Post {
        /// Post content
        text: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run, defaulting to the interactive client
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::App)
    }
}
