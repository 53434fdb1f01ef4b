use std::process::ExitCode;
use std::sync::Arc;

use authsync::config::{ClientConfig, ConfigError};
use authsync::net::api::{ApiBuildError, HttpSessionApi};
use authsync::net::types::{AuthError, User};
use authsync::state::auth::AuthSession;
use authsync::state::session::Navigation;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    ApiBuild(#[from] ApiBuildError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "authsync", about = "Session-aware client for cookie-session auth servers")]
struct Cli {
    #[arg(long, env = "AUTHSYNC_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "AUTHSYNC_COOKIE", help = "Session cookie to resume, as name=value")]
    cookie: Option<String>,

    #[arg(long, default_value = "/", help = "Location the session starts at")]
    location: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the current user and report the resulting session state.
    Whoami,
    /// Create an account and sign in.
    Register {
        username: String,
        #[arg(long, env = "AUTHSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with existing credentials.
    Login {
        username: String,
        #[arg(long, env = "AUTHSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the current session.
    Logout,
}

#[derive(Debug, Serialize)]
struct Summary {
    status: &'static str,
    user: Option<User>,
    location: String,
    navigations: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cookie: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }
    if let Some(cookie) = cli.cookie.as_deref() {
        config = config.with_session_cookie(cookie)?;
    }

    let api = Arc::new(HttpSessionApi::new(config)?);
    tracing::debug!(base_url = api.base_url(), "session client ready");
    let (session, mut nav_rx) = AuthSession::new(api.clone(), cli.location);

    match cli.command {
        Command::Whoami => {
            session.initialize().await;
        }
        Command::Register { username, password } => {
            session.register(&username, &password).await?;
        }
        Command::Login { username, password } => {
            session.login(&username, &password).await?;
        }
        Command::Logout => session.logout().await?,
    }

    let status = session.status();
    let summary = Summary {
        status: status.label(),
        user: status.into_user(),
        location: session.location(),
        navigations: drain_navigations(&mut nav_rx),
        cookie: api.session_cookie(),
    };
    print_json(&summary)
}

fn drain_navigations(rx: &mut mpsc::UnboundedReceiver<Navigation>) -> Vec<&'static str> {
    let mut paths = Vec::new();
    while let Ok(navigation) = rx.try_recv() {
        paths.push(navigation.to.path());
    }
    paths
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
