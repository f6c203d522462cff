//! Account command - open, inspect, fund and close accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use comfy_table::{Cell, Color};
use rust_decimal::Decimal;
use uuid::Uuid;

use ledger_core::LogEvent;

use super::{authenticate, get_context, get_logger, log_event, log_failure};
use crate::output::{self, create_table, format_money};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new zero-balance account
    New {
        /// ISO 4217 currency code (defaults to the configured currency)
        #[arg(long)]
        currency: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one of your accounts
    Show {
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Close an empty account
    Close {
        id: Uuid,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Add funds to one of your accounts
    Deposit {
        id: Uuid,
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Take funds out of one of your accounts
    Withdraw {
        id: Uuid,
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: AccountCommands, username: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let user = authenticate(&ctx, username).await?;

    match command {
        AccountCommands::New { currency, json } => {
            let currency = currency.unwrap_or_else(|| ctx.config.default_currency.clone());
            let account = ctx
                .account_service
                .create_account(user.id, &currency)
                .await
                .map_err(|e| log_failure(&logger, "account_create_failed", "account new", e))?;
            log_event(
                &logger,
                LogEvent::new("account_created")
                    .with_command("account new")
                    .with_account(account.id),
            );

            if json {
                return output::json(&account);
            }
            output::success(&format!("Opened {} account", account.currency));
            println!("  ID: {}", account.id);
        }
        AccountCommands::List { json } => {
            let accounts = ctx.account_service.list_accounts(user.id).await?;

            if json {
                return output::json(&accounts);
            }
            if accounts.is_empty() {
                println!("{}", "No accounts yet. Use 'ledger account new' to open one.".yellow());
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["ID", "Currency", "Balance", "Opened"]);
            for account in &accounts {
                let balance = Cell::new(format_money(account.balance, &account.currency));
                let balance = if account.balance.is_zero() {
                    balance.fg(Color::DarkGrey)
                } else {
                    balance.fg(Color::Green)
                };
                table.add_row(vec![
                    Cell::new(account.id),
                    Cell::new(&account.currency),
                    balance,
                    Cell::new(account.created_at.format("%Y-%m-%d")),
                ]);
            }
            println!("{}", table);
        }
        AccountCommands::Show { id, json } => {
            let account = ctx.account_service.get_account(id, user.id).await?;

            if json {
                return output::json(&account);
            }
            println!("{}", account.id.to_string().bold());
            println!("  Balance: {}", format_money(account.balance, &account.currency));
            println!("  Opened: {}", account.created_at.format("%Y-%m-%d %H:%M:%S"));
        }
        AccountCommands::Close { id, force } => {
            if !force {
                use dialoguer::Confirm;
                if !Confirm::new()
                    .with_prompt(format!("Close account {}?", id))
                    .default(false)
                    .interact()?
                {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            ctx.account_service
                .close_account(id, user.id)
                .await
                .map_err(|e| log_failure(&logger, "account_close_failed", "account close", e))?;
            log_event(
                &logger,
                LogEvent::new("account_closed")
                    .with_command("account close")
                    .with_account(id),
            );
            output::success(&format!("Closed account {}", id));
        }
        AccountCommands::Deposit { id, amount, json } => {
            let balance = ctx
                .account_service
                .deposit(id, user.id, amount)
                .await
                .map_err(|e| log_failure(&logger, "deposit_failed", "account deposit", e))?;
            log_event(&logger, LogEvent::new("command_executed").with_command("account deposit").with_account(id));
            print_balance(id, balance, json)?;
        }
        AccountCommands::Withdraw { id, amount, json } => {
            let balance = ctx
                .account_service
                .withdraw(id, user.id, amount)
                .await
                .map_err(|e| log_failure(&logger, "withdraw_failed", "account withdraw", e))?;
            log_event(&logger, LogEvent::new("command_executed").with_command("account withdraw").with_account(id));
            print_balance(id, balance, json)?;
        }
    }

    Ok(())
}

fn print_balance(id: Uuid, balance: Decimal, json: bool) -> Result<()> {
    if json {
        return output::json(&serde_json::json!({ "account_id": id, "balance": balance }));
    }
    output::success(&format!("New balance: {}", output::format_amount(balance)));
    Ok(())
}
