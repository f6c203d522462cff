//! Status command - show ledger-wide totals

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Table, ContentArrangement};

use super::get_context;
use crate::output::{create_table, format_amount, format_size};

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    table.add_row(vec!["Pending", &status.pending_transactions.to_string()]);
    if let Ok(size) = ctx.repository.db_size() {
        table.add_row(vec!["Database size", &format_size(size)]);
    }

    println!("{}", table);
    println!();

    if !status.currencies.is_empty() {
        println!("{}", "Balances by Currency".bold());
        let mut totals = create_table();
        totals.set_header(vec!["Currency", "Accounts", "Total"]);
        for currency in &status.currencies {
            totals.add_row(vec![
                currency.currency.clone(),
                currency.accounts.to_string(),
                format_amount(currency.total_balance),
            ]);
        }
        println!("{}", totals);
    }

    if status.pending_transactions > 0 {
        println!();
        println!(
            "{}",
            "Pending transactions need attention: run 'ledger reconcile check -v'".yellow()
        );
    }

    Ok(())
}
