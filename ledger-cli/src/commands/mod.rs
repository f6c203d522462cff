//! CLI command implementations

pub mod account;
pub mod history;
pub mod logs;
pub mod reconcile;
pub mod status;
pub mod transfer;
pub mod user;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use dialoguer::Password;
use ledger_core::{EntryPoint, Error, LedgerContext, LogEvent, LoggingService, User};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let ledger_dir = get_ledger_dir().ok()?;
    std::fs::create_dir_all(&ledger_dir).ok()?;
    LoggingService::new(&ledger_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Record a failed command and hand the error back for reporting
pub fn log_failure(logger: &Option<LoggingService>, event: &str, command: &str, err: Error) -> anyhow::Error {
    log_event(logger, LogEvent::from_error(event, &err).with_command(command));
    err.into()
}

/// Get the ledger directory from `LEDGER_DIR` or `~/.ledger`
pub fn get_ledger_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGER_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory; set LEDGER_DIR")?;
    Ok(home.join(".ledger"))
}

/// Open the ledger, creating the directory and schema on first use
pub fn get_context() -> Result<LedgerContext> {
    let ledger_dir = get_ledger_dir()?;
    LedgerContext::new(&ledger_dir).context("Failed to initialize ledger context")
}

/// Read a password from `LEDGER_PASSWORD`, or prompt for one
pub fn read_password(prompt: &str, confirm: bool) -> Result<String> {
    if let Ok(password) = std::env::var("LEDGER_PASSWORD") {
        return Ok(password);
    }
    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok(input.interact()?)
}

/// Resolve `--user` into an authenticated user
pub async fn authenticate(ctx: &LedgerContext, username: Option<&str>) -> Result<User> {
    let Some(username) = username else {
        bail!("No user given. Pass --user or set LEDGER_USER.");
    };
    let password = read_password("Password", false)?;
    Ok(ctx.auth_service.authenticate(username, &password).await?)
}
