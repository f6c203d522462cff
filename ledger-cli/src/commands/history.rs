//! History command - list transfers for one account

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color};
use uuid::Uuid;

use ledger_core::{TransactionQuery, TransactionStatus};

use super::{authenticate, get_context};
use crate::output::{self, create_table, format_amount};

pub struct HistoryArgs {
    pub account: Uuid,
    pub limit: Option<usize>,
    pub offset: usize,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

pub async fn run(username: Option<&str>, args: HistoryArgs, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let user = authenticate(&ctx, username).await?;

    let limit = args.limit.unwrap_or(ctx.config.page_size);
    let query = TransactionQuery::page(limit, args.offset).with_window(args.since, args.until);
    let transactions = ctx
        .history_service
        .list_transactions(args.account, user.id, &query)
        .await?;

    if json {
        return output::json(&transactions);
    }

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Time", "ID", "Direction", "Counterparty", "Amount", "Status"]);
    for tx in &transactions {
        let outgoing = tx.from_account_id == args.account;
        let (direction, counterparty, amount) = if outgoing {
            ("out", tx.to_account_id, Cell::new(format!("-{}", format_amount(tx.amount))).fg(Color::Red))
        } else {
            ("in", tx.from_account_id, Cell::new(format!("+{}", format_amount(tx.amount))).fg(Color::Green))
        };
        let status = match tx.status {
            TransactionStatus::Success => Cell::new(tx.status),
            TransactionStatus::Pending => Cell::new(tx.status).fg(Color::Yellow),
            TransactionStatus::Failed => Cell::new(tx.status).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(tx.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(tx.id),
            Cell::new(direction),
            Cell::new(counterparty),
            amount,
            status,
        ]);
    }
    println!("{}", table);

    if transactions.len() == limit {
        output::info(&format!(
            "Showing {} records from offset {}. Use --offset {} for more.",
            limit,
            args.offset,
            args.offset + limit
        ));
    }

    Ok(())
}
