//! Blogline - terminal blogging client
//!
#![doc = "Main entry point for the Blogline client."]

use anyhow::Result;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blogline::auth_form::AuthMode;
use blogline::cli::{Cli, Commands};
use blogline::commands;
use blogline::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_tracing(cli.verbose, cli.log_json);

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path, &cli)?;
    config.validate()?;

    match cli.command_or_default() {
        Commands::App => commands::app::run_app(config).await,
        Commands::Signup { email, password } => {
            commands::account::authenticate(&config, AuthMode::SignUp, email, password).await
        }
        Commands::Login { email, password } => {
            commands::account::authenticate(&config, AuthMode::SignIn, email, password).await
        }
        Commands::Logout => commands::account::logout(&config).await,
        Commands::Whoami => commands::account::whoami(&config).await,
        Commands::Feed { json } => commands::posts::show_feed(&config, json).await,
        Commands::Post { text } => commands::posts::publish(&config, text).await,
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(verbose: bool, json: bool) {
    let default_directive = if verbose {
        "blogline=debug"
    } else {
        "blogline=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
