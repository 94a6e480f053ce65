//! Special commands parser for the interactive client
//!
//! Commands are prefixed with `/` and are case-insensitive. Anything else
//! typed at the prompt is post text.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an argument it does not take
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed in the interactive client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Switch the form to sign-in and prompt for credentials
    ///
    /// An email may be given inline: `/login u@x.com`.
    Login(Option<String>),

    /// Switch the form to sign-up and prompt for credentials
    Signup(Option<String>),

    /// Flip the form between sign-in and sign-up
    Toggle,

    /// Submit the credential form in its current mode
    Submit,

    /// Sign out
    Logout,

    /// Show the signed-in identity
    Whoami,

    /// Print the loaded feed
    ShowFeed,

    /// Reload the feed from the store
    Refresh,

    /// Show the draft, or replace it with the given text
    Draft(Option<String>),

    /// Submit the current draft again
    Retry,

    /// Display help information
    Help,

    /// Exit the interactive client
    Exit,

    /// Not a special command
    ///
    /// The input is post text.
    None,
}

/// Split `/command rest` into a lowercased command and the untouched rest
fn split_command(trimmed: &str) -> (String, Option<&str>) {
    match trimmed.split_once(char::is_whitespace) {
        Some((cmd, rest)) => {
            let rest = rest.trim();
            (
                cmd.to_lowercase(),
                if rest.is_empty() { None } else { Some(rest) },
            )
        }
        None => (trimmed.to_lowercase(), None),
    }
}

fn no_argument(
    command: &str,
    arg: Option<&str>,
    cmd: SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    match arg {
        None => Ok(cmd),
        Some(arg) => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns [`CommandError::UnknownCommand`] for input starting with `/`
/// that is not a known command, and [`CommandError::UnsupportedArgument`]
/// when a command that takes no argument is given one.
///
/// # Examples
///
/// ```
/// use blogline::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/login u@x.com").unwrap();
/// assert_eq!(cmd, SpecialCommand::Login(Some("u@x.com".to_string())));
///
/// let cmd = parse_special_command("hello world").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return Ok(match lower.as_str() {
            "exit" | "quit" => SpecialCommand::Exit,
            _ => SpecialCommand::None,
        });
    }

    let (command, arg) = split_command(trimmed);
    match command.as_str() {
        "/login" | "/signin" => Ok(SpecialCommand::Login(arg.map(str::to_string))),
        "/signup" | "/register" => Ok(SpecialCommand::Signup(arg.map(str::to_string))),
        // Draft text keeps its case and inner whitespace.
        "/draft" => Ok(SpecialCommand::Draft(arg.map(str::to_string))),

        "/toggle" => no_argument("/toggle", arg, SpecialCommand::Toggle),
        "/submit" => no_argument("/submit", arg, SpecialCommand::Submit),
        "/logout" | "/signout" => no_argument("/logout", arg, SpecialCommand::Logout),
        "/whoami" => no_argument("/whoami", arg, SpecialCommand::Whoami),
        "/feed" => no_argument("/feed", arg, SpecialCommand::ShowFeed),
        "/refresh" => no_argument("/refresh", arg, SpecialCommand::Refresh),
        "/retry" => no_argument("/retry", arg, SpecialCommand::Retry),
        "/help" | "/?" => no_argument("/help", arg, SpecialCommand::Help),
        "/exit" | "/quit" => no_argument("/exit", arg, SpecialCommand::Exit),

        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Blogline Commands
=================

ACCOUNT:
  /login [email]   - Log in (prompts for email and password)
  /signup [email]  - Create an account (prompts for email and password)
  /toggle          - Switch the form between login and sign up
  /submit          - Submit the form in its current mode
  /logout          - Log out
  /whoami          - Show who is logged in

FEED:
  /feed            - Show the loaded feed, newest first
  /refresh         - Reload the feed
  /draft [text]    - Show the draft, or replace it
  /retry           - Submit the current draft again

SESSION CONTROL:
  /help            - Show this help message
  /?               - Same as /help
  /exit            - Exit (also: exit, quit)

NOTES:
  - Commands are case-insensitive
  - When logged in, any other text is posted
  - When logged out, posting is disabled; log in first
  - A post that fails to save stays in the draft; use /retry
"#
    );
}
