//! Transfer command - move funds between two accounts

use anyhow::{anyhow, Result};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use ledger_core::{Error, LogEvent, OperationResult};

use super::{authenticate, get_context, get_logger, log_event};
use crate::output;

#[derive(Serialize)]
struct TransferOutput {
    transaction_id: Uuid,
    from_account_id: Uuid,
    to_account_id: Uuid,
    amount: Decimal,
}

pub async fn run(username: Option<&str>, from: Uuid, to: Uuid, amount: Decimal, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let user = authenticate(&ctx, username).await?;

    let result = ctx.transfer_engine.transfer(user.id, from, to, amount).await;

    match &result {
        Ok(id) => log_event(
            &logger,
            LogEvent::new("transfer_completed")
                .with_command("transfer")
                .with_transaction(*id),
        ),
        Err(e @ Error::AuditWriteFailed { .. }) => log_event(
            &logger,
            LogEvent::from_error("transfer_audit_failed", e).with_command("transfer"),
        ),
        Err(e) => log_event(
            &logger,
            LogEvent::from_error("transfer_rejected", e).with_command("transfer"),
        ),
    }

    if json {
        let message = result.as_ref().err().map(|e| e.to_string());
        let envelope: OperationResult<TransferOutput> = result
            .map(|transaction_id| TransferOutput {
                transaction_id,
                from_account_id: from,
                to_account_id: to,
                amount,
            })
            .into();
        output::json(&envelope)?;
        return match message {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        };
    }

    match result {
        Ok(id) => {
            output::success(&format!("Transferred {} from {} to {}", output::format_amount(amount), from, to));
            println!("  Transaction: {}", id);
            Ok(())
        }
        Err(Error::AuditWriteFailed { transaction, reason }) => {
            output::warning("The funds moved, but the transfer could not be written to history.");
            println!("  Reason: {}", reason);
            println!("  Replay it with:");
            println!(
                "    ledger reconcile replay '{}'",
                serde_json::to_string(transaction.as_ref())?
            );
            Err(anyhow!("Transfer {} is missing from history", transaction.id.to_string().bold()))
        }
        Err(e) => Err(e.into()),
    }
}
