/*!
Command handlers for the CLI

- `app`     : Interactive client
- `account` : One-shot signup, login, logout and whoami
- `posts`   : One-shot feed listing and posting

Handlers build an [`App`](crate::app::App) from the configuration and
drive it; they hold no state of their own.
*/

use crate::app::App;
use crate::backend::create_backend;
use crate::config::Config;
use crate::error::Result;
use crate::session_store::create_session_store;

// Special commands parser for the interactive client
pub mod special_commands;

/// Build the client for a configuration
fn build_app(config: &Config) -> Result<App> {
    let backend = create_backend(config)?;
    let store = create_session_store(config);
    Ok(App::new(backend, store, config))
}

// Interactive client
pub mod app {
    //! Interactive client.
    //!
    //! A readline loop standing in for the single-page UI: the login form
    //! while signed out, the feed and composer while signed in.

    use super::*;
    use crate::app::{Screen, SessionNotice};
    use crate::auth_form::AuthMode;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::feed::{LoadOutcome, SubmitOutcome};
    use crate::render::render_feed;
    use colored::Colorize;
    use rustyline::completion::Completer;
    use rustyline::config::Configurer;
    use rustyline::error::ReadlineError;
    use rustyline::highlight::Highlighter;
    use rustyline::hint::Hinter;
    use rustyline::history::DefaultHistory;
    use rustyline::validate::Validator;
    use rustyline::{ColorMode, Editor, Helper};
    use std::borrow::Cow;

    type ClientEditor = Editor<PasswordMask, DefaultHistory>;

    /// Line helper that hides typed characters while `masking` is set
    #[derive(Default)]
    struct PasswordMask {
        masking: bool,
    }

    impl Highlighter for PasswordMask {
        fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
            if self.masking {
                Cow::Owned("*".repeat(line.chars().count()))
            } else {
                Cow::Borrowed(line)
            }
        }

        fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
            self.masking
        }
    }

    impl Completer for PasswordMask {
        type Candidate = String;
    }

    impl Hinter for PasswordMask {
        type Hint = String;
    }

    impl Validator for PasswordMask {}

    impl Helper for PasswordMask {}

    /// Start the interactive client
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    pub async fn run_app(config: Config) -> Result<()> {
        tracing::info!("Starting interactive client");

        let mut app = build_app(&config)?;
        app.start().await;

        let mut rl = ClientEditor::new()?;
        rl.set_helper(Some(PasswordMask::default()));
        print_welcome_banner(&app);

        loop {
            print_notices(&mut app);

            let prompt = format_prompt(&app.screen());
            let line = match rl.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            rl.add_history_entry(trimmed)?;

            let command = match parse_special_command(trimmed) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e.to_string().red());
                    continue;
                }
            };

            match command {
                SpecialCommand::Exit => break,
                SpecialCommand::Help => print_help(),
                SpecialCommand::Login(email) => {
                    app.form_mut().set_mode(AuthMode::SignIn);
                    prompt_and_submit(&mut app, &mut rl, email).await?;
                }
                SpecialCommand::Signup(email) => {
                    app.form_mut().set_mode(AuthMode::SignUp);
                    prompt_and_submit(&mut app, &mut rl, email).await?;
                }
                SpecialCommand::Toggle => {
                    let mode = app.form_mut().toggle_mode();
                    println!("Switched to {} {}", mode.colored_tag(), mode.toggle_hint());
                }
                SpecialCommand::Submit => prompt_and_submit(&mut app, &mut rl, None).await?,
                SpecialCommand::Logout => {
                    app.sign_out().await?;
                    println!("{}", "Logged out".green());
                }
                SpecialCommand::Whoami => match app.sessions().current() {
                    Some(session) => println!("Logged in as {}", session.email.cyan()),
                    None => println!("Not logged in"),
                },
                SpecialCommand::ShowFeed => println!("\n{}\n", render_feed(&app.posts(), true)),
                SpecialCommand::Refresh => match app.refresh_feed().await {
                    LoadOutcome::Loaded(_) => println!("\n{}\n", render_feed(&app.posts(), true)),
                    LoadOutcome::Failed => {
                        println!("{}", "Could not load posts; showing the last feed".yellow())
                    }
                },
                SpecialCommand::Draft(None) => {
                    let draft = app.draft();
                    if draft.is_empty() {
                        println!("Draft is empty");
                    } else {
                        println!("Draft: {}", draft);
                    }
                }
                SpecialCommand::Draft(Some(text)) => {
                    app.set_draft(text);
                    println!("Draft updated");
                }
                SpecialCommand::Retry => submit_draft(&app).await,
                SpecialCommand::None => {
                    if app.sessions().is_signed_in() {
                        app.set_draft(trimmed);
                        submit_draft(&app).await;
                    } else {
                        println!(
                            "{}",
                            "Log in to post. Type /login or /signup, or /help for commands."
                                .yellow()
                        );
                    }
                }
            }
        }

        app.shutdown();
        println!("Goodbye!");
        Ok(())
    }

    /// Collect missing credentials and submit the form
    async fn prompt_and_submit(
        app: &mut App,
        rl: &mut ClientEditor,
        email: Option<String>,
    ) -> Result<()> {
        if let Screen::Feed { email } = app.screen() {
            println!("Already logged in as {}; /logout first", email.cyan());
            return Ok(());
        }

        let email = match email {
            Some(email) => email,
            None if !app.form().email.is_empty() => app.form().email.clone(),
            None => match read_field(rl, "Email: ")? {
                Some(email) => email,
                None => return Ok(()),
            },
        };
        let Some(password) = read_password(rl)? else {
            return Ok(());
        };
        app.form_mut().fill(email, password);

        let mode = app.form().mode();
        match app.submit_credentials().await {
            Ok(session) => {
                let verb = match mode {
                    AuthMode::SignIn => "Logged in",
                    AuthMode::SignUp => "Signed up",
                };
                println!("{} as {}", verb.green(), session.email.cyan());
                println!("\n{}\n", render_feed(&app.posts(), true));
            }
            Err(e) => println!("{}", e.to_string().red()),
        }
        Ok(())
    }

    /// Read one line without adding it to history; `None` on Ctrl-C/Ctrl-D
    fn read_field(rl: &mut ClientEditor, prompt: &str) -> Result<Option<String>> {
        match rl.readline(prompt) {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the password with every character shown as `*`
    fn read_password(rl: &mut ClientEditor) -> Result<Option<String>> {
        set_masking(rl, true);
        let line = rl.readline("Password: ");
        set_masking(rl, false);
        match line {
            // Passwords are not trimmed.
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_masking(rl: &mut ClientEditor, masking: bool) {
        if let Some(helper) = rl.helper_mut() {
            helper.masking = masking;
        }
        // Highlighting, and so masking, only runs with color forced on.
        rl.set_color_mode(if masking {
            ColorMode::Forced
        } else {
            ColorMode::Enabled
        });
    }

    async fn submit_draft(app: &App) {
        match app.submit_post().await {
            SubmitOutcome::Posted { .. } => println!("{}", "Posted".green()),
            SubmitOutcome::EmptyDraft => println!("{}", "Nothing to post".yellow()),
            SubmitOutcome::Busy => println!("{}", "Still posting the previous draft".yellow()),
            SubmitOutcome::Failed => println!(
                "{}",
                "Could not save the post; it is kept as the draft (/retry)".red()
            ),
        }
    }

    fn print_notices(app: &mut App) {
        for notice in app.drain_notices() {
            match notice {
                SessionNotice::SignedIn(email) => {
                    println!("{} {}", "Session started for".dimmed(), email.cyan())
                }
                SessionNotice::SignedOut => println!("{}", "Session ended".yellow()),
            }
        }
    }

    fn format_prompt(screen: &Screen) -> String {
        match screen {
            Screen::Login { mode } => format!("{} >>> ", mode.colored_tag()),
            Screen::Feed { email } => format!("[{}] >>> ", email.cyan()),
        }
    }

    fn print_welcome_banner(app: &App) {
        println!("\n╔══════════════════════════════════════════════╗");
        println!("║            Blogline - Welcome!               ║");
        println!("╚══════════════════════════════════════════════╝\n");
        println!("Backend: {}", app.backend_kind());
        match app.screen() {
            Screen::Feed { email } => {
                println!("Logged in as {}\n", email.cyan());
                println!("{}\n", render_feed(&app.posts(), true));
            }
            Screen::Login { mode } => {
                println!("Not logged in. {}\n", mode.toggle_hint());
            }
        }
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

}

// One-shot account commands
pub mod account {
    //! Account commands for scripting.
    //!
    //! Sessions are persisted through the configured session store, so a
    //! `login` here is visible to a later `post`.

    use super::*;
    use crate::auth_form::AuthMode;

    /// Create an account, or sign in, with the given credentials
    pub async fn authenticate(
        config: &Config,
        mode: AuthMode,
        email: String,
        password: String,
    ) -> Result<()> {
        let mut app = build_app(config)?;
        app.sessions().restore().await;
        app.form_mut().set_mode(mode);
        app.form_mut().fill(email, password);
        let session = app.submit_credentials().await?;
        match mode {
            AuthMode::SignIn => println!("Logged in as {}", session.email),
            AuthMode::SignUp => println!("Signed up as {}", session.email),
        }
        Ok(())
    }

    /// Sign out and forget the stored session
    pub async fn logout(config: &Config) -> Result<()> {
        let app = build_app(config)?;
        app.sessions().restore().await;
        app.sign_out().await?;
        println!("Logged out");
        Ok(())
    }

    /// Print the signed-in account
    pub async fn whoami(config: &Config) -> Result<()> {
        let app = build_app(config)?;
        app.sessions().restore().await;
        match app.sessions().fresh_session().await {
            Some(session) => println!("{}", session.email),
            None => println!("Not logged in"),
        }
        Ok(())
    }
}

// One-shot feed commands
pub mod posts {
    //! Feed listing and posting for scripting.

    use super::*;
    use crate::error::BloglineError;
    use crate::feed::{LoadOutcome, SubmitOutcome};
    use crate::render::render_feed;

    /// Print the feed, newest first
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `json` - Emit the posts as a JSON array
    pub async fn show_feed(config: &Config, json: bool) -> Result<()> {
        let app = build_app(config)?;
        app.sessions().restore().await;
        if app.refresh_feed().await == LoadOutcome::Failed {
            return Err(BloglineError::Store("Could not load posts".to_string()).into());
        }

        let posts = app.posts();
        if json {
            println!("{}", serde_json::to_string_pretty(&posts)?);
        } else {
            println!("{}", render_feed(&posts, false));
        }
        Ok(())
    }

    /// Publish a post as the stored session, or anonymously
    pub async fn publish(config: &Config, text: String) -> Result<()> {
        let app = build_app(config)?;
        app.sessions().restore().await;
        app.set_draft(text);
        match app.submit_post().await {
            SubmitOutcome::Posted { id } => {
                println!("Posted {}", id);
                Ok(())
            }
            SubmitOutcome::EmptyDraft => {
                Err(BloglineError::Validation("Post content is empty".to_string()).into())
            }
            SubmitOutcome::Busy => {
                Err(BloglineError::Store("Another post is in flight".to_string()).into())
            }
            SubmitOutcome::Failed => {
                Err(BloglineError::Store("Could not save the post".to_string()).into())
            }
        }
    }
}
