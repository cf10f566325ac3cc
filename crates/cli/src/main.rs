//! Storesync CLI - migrations, one-off syncs, and webhook tooling.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! storesync migrate
//!
//! # Mirror every product now
//! storesync sync products
//!
//! # Mirror everything
//! storesync sync all
//!
//! # Sign a webhook body for a manual test delivery
//! storesync sign --secret-env WEBHOOK_SECRET body.json
//!
//! # Manage webhook subscriptions
//! storesync webhooks list
//! storesync webhooks register
//! storesync webhooks delete-all
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "storesync")]
#[command(author, version, about = "Storesync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Run a bulk sync in-process and print the report
    Sync {
        /// `products`, `customers`, `orders`, or `all`
        target: String,
    },
    /// Print the base64 HMAC-SHA256 signature of a body file
    Sign {
        /// Environment variable holding the signing secret
        #[arg(long, default_value = "WEBHOOK_SECRET")]
        secret_env: String,

        /// File containing the exact request body
        file: PathBuf,
    },
    /// Manage platform webhook subscriptions
    Webhooks {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// List current subscriptions
    List,
    /// Subscribe every topic at the public callback URL
    Register,
    /// Delete every subscription
    DeleteAll,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync { target } => commands::sync::run(&target).await?,
        Commands::Sign { secret_env, file } => {
            let signature = commands::sign::sign_file(&secret_env, &file)?;
            commands::print_line(&signature);
        }
        Commands::Webhooks { action } => match action {
            WebhookAction::List => commands::webhooks::list().await?,
            WebhookAction::Register => commands::webhooks::register().await?,
            WebhookAction::DeleteAll => commands::webhooks::delete_all().await?,
        },
    }
    Ok(())
}
