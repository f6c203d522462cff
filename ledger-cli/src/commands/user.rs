//! User command - register and inspect users

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use ledger_core::LogEvent;

use super::{authenticate, get_context, get_logger, log_event, log_failure, read_password};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Register {
        /// Username (case-insensitive)
        username: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the authenticated user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: UserCommands, username: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    match command {
        UserCommands::Register { username, json } => {
            let password = read_password("Choose a password", true)?;
            let user = ctx
                .auth_service
                .register(&username, &password)
                .await
                .map_err(|e| log_failure(&logger, "register_failed", "user register", e))?;
            log_event(&logger, LogEvent::new("command_executed").with_command("user register"));

            if json {
                return output::json(&user);
            }
            output::success(&format!("Registered user {}", user.username));
            println!("  ID: {}", user.id);
        }
        UserCommands::Whoami { json } => {
            let user = authenticate(&ctx, username).await?;
            let accounts = ctx.account_service.list_accounts(user.id).await?;

            if json {
                return output::json(&serde_json::json!({
                    "user": user,
                    "accounts": accounts.len(),
                }));
            }
            println!("{}", user.username.bold());
            println!("  ID: {}", user.id);
            println!("  Registered: {}", user.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("  Accounts: {}", accounts.len());
        }
    }

    Ok(())
}
