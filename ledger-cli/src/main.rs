//! Ledger CLI - accounts and transfers in your terminal

use std::process::ExitCode;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

mod commands;
mod output;

use commands::{account, history, logs, reconcile, status, transfer, user};

/// Ledger - accounts and atomic transfers in your terminal
#[derive(Parser)]
#[command(name = "ledger", version, about, long_about = None)]
struct Cli {
    /// User to act as. The password is read from LEDGER_PASSWORD or prompted for.
    #[arg(long, short, global = true, env = "LEDGER_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register and inspect users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Open, inspect and close accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Move funds between two accounts
    Transfer {
        /// Account to debit (must be yours)
        from: Uuid,
        /// Account to credit
        to: Uuid,
        /// Amount, e.g. 30.00
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transfers into or out of an account, newest first
    History {
        /// Account to list (must be yours)
        account: Uuid,
        /// Page size (defaults to the configured page size)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Number of records to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Only records created at or after this time (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// Only records created before this time (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Repair and verify the transaction history
    Reconcile {
        #[command(subcommand)]
        command: reconcile::ReconcileCommands,
    },

    /// Show ledger-wide totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let username = cli.user;
    match cli.command {
        Commands::User { command } => user::run(command, username.as_deref()).await,
        Commands::Account { command } => account::run(command, username.as_deref()).await,
        Commands::Transfer { from, to, amount, json } => {
            transfer::run(username.as_deref(), from, to, amount, json).await
        }
        Commands::History { account, limit, offset, since, until, json } => {
            let args = history::HistoryArgs { account, limit, offset, since, until };
            history::run(username.as_deref(), args, json).await
        }
        Commands::Reconcile { command } => reconcile::run(command).await,
        Commands::Status { json } => status::run(json).await,
        Commands::Logs { command } => logs::run(command),
    }
}
