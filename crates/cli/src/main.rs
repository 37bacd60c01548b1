//! Imported CLI - drive the storefront session from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in and persist the session to ./session.json
//! imported session login -u shopper
//!
//! # Create an account from an email address
//! imported session signup jane@example.com
//!
//! # Inspect, refresh, use and drop the session
//! imported session status
//! imported session refresh
//! imported session fetch https://shop.example/graphql -X POST -d '{"query":"{ viewer { id } }"}'
//! imported session logout
//! ```
//!
//! # Environment Variables
//!
//! - `IMPORTED_STOREFRONT_URL` - Storefront base URL (default: http://127.0.0.1:3000)
//! - `COMMERCE_GRAPHQL_ENDPOINT` - Commerce GraphQL endpoint used for token refresh
//! - `IMPORTED_SESSION_FILE` - Session file (default: session.json)
//! - `IMPORTED_PASSWORD` - Password for `session login` when `-p` is omitted

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

mod commands;

#[derive(Parser)]
#[command(name = "imported")]
#[command(author, version, about = "Imported storefront CLI tools")]
struct Cli {
    /// Storefront base URL serving /api/login and /api/signup
    #[arg(
        long,
        global = true,
        env = "IMPORTED_STOREFRONT_URL",
        default_value = "http://127.0.0.1:3000"
    )]
    storefront_url: Url,

    /// Commerce GraphQL endpoint used for token refresh
    #[arg(long, global = true, env = "COMMERCE_GRAPHQL_ENDPOINT")]
    graphql_endpoint: Url,

    /// File the session is persisted to
    #[arg(
        long,
        global = true,
        env = "IMPORTED_SESSION_FILE",
        default_value = "session.json"
    )]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the persisted storefront session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Log in with username (or email) and password
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (prefer the environment variable over the flag)
        #[arg(short, long, env = "IMPORTED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account from an email address and log into it
    Signup {
        /// Email address for the new account
        email: String,
    },
    /// Show the persisted session
    Status,
    /// Exchange the refresh token for a new auth token
    Refresh,
    /// Send a request with the session's bearer token, refreshing on 403
    Fetch {
        url: Url,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Forget the persisted session
    Logout,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "imported_cli=info,imported_session=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let context = commands::session::SessionContext::open(
        cli.storefront_url,
        cli.graphql_endpoint,
        cli.session_file,
    )?;

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::Login { username, password } => {
                commands::session::login(&context, &username, password.into()).await?;
            }
            SessionAction::Signup { email } => commands::session::signup(&context, &email).await?,
            SessionAction::Status => commands::session::status(&context),
            SessionAction::Refresh => commands::session::refresh(&context).await?,
            SessionAction::Fetch { url, method, data } => {
                commands::session::fetch(&context, &method, url, data).await?;
            }
            SessionAction::Logout => commands::session::logout(&context),
        },
    }
    Ok(())
}
