//! SAMS CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! sams-cli migrate
//!
//! # Create a staff account (password from SAMS_NEW_USER_PASSWORD)
//! sams-cli user create -u admin -n "Quản trị viên" -r admin
//!
//! # Generate a month's invoices by hand
//! sams-cli invoices generate --year 2025 --month 3
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create login accounts
//! - `invoices generate` - Run monthly invoice generation for a period

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sams-cli")]
#[command(author, version, about = "SAMS building management CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage login accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Invoice maintenance
    Invoices {
        #[command(subcommand)]
        action: InvoiceAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Display name
        #[arg(short = 'n', long)]
        full_name: String,

        /// Role (`admin`, `manager`, `accountant`, `receptionist`, `resident`)
        #[arg(short, long, default_value = "receptionist")]
        role: String,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
enum InvoiceAction {
    /// Generate monthly invoices for every occupied apartment
    Generate {
        #[arg(long)]
        year: i32,

        /// Month number (1-12)
        #[arg(long)]
        month: u32,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                full_name,
                role,
                email,
                phone,
            } => {
                commands::user::create(&commands::user::CreateUser {
                    username: &username,
                    full_name: &full_name,
                    role: &role,
                    email: email.as_deref(),
                    phone: phone.as_deref(),
                })
                .await?;
            }
        },
        Commands::Invoices { action } => match action {
            InvoiceAction::Generate { year, month } => {
                let report = commands::invoices::generate(year, month).await?;
                if !report.failed.is_empty() {
                    return Err(format!("{} apartment(s) failed", report.failed.len()).into());
                }
            }
        },
    }
    Ok(())
}
