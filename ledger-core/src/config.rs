//! Configuration management
//!
//! Settings live in `settings.json` inside the ledger directory:
//! ```json
//! {
//!   "ledger": { "defaultCurrency": "USD", "pageSize": 20, "maxPageSize": 100 }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Account;

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_page_size: Option<usize>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Ledger configuration (resolved view of settings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Currency for `ledger account new` when none is given
    pub default_currency: String,
    /// History page size when `--limit` is not given
    pub page_size: usize,
    /// Upper bound for any requested page size
    pub max_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_currency: DEFAULT_CURRENCY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Load config from the ledger directory
    ///
    /// Environment overrides: `LEDGER_DEFAULT_CURRENCY`, `LEDGER_PAGE_SIZE`.
    pub fn load(ledger_dir: &Path) -> Result<Self> {
        let raw = read_settings(&ledger_dir.join("settings.json"))?;
        let defaults = Self::default();

        let default_currency = std::env::var("LEDGER_DEFAULT_CURRENCY")
            .ok()
            .or(raw.ledger.default_currency)
            .map(|c| Account::normalize_currency(&c))
            .unwrap_or(defaults.default_currency);

        let page_size = match std::env::var("LEDGER_PAGE_SIZE").ok() {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("LEDGER_PAGE_SIZE is not a number: {}", value))?,
            None => raw.ledger.page_size.unwrap_or(defaults.page_size),
        };

        let config = Self {
            default_currency,
            page_size,
            max_page_size: raw.ledger.max_page_size.unwrap_or(defaults.max_page_size),
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to the ledger directory, keeping unmanaged keys
    pub fn save(&self, ledger_dir: &Path) -> Result<()> {
        let settings_path = ledger_dir.join("settings.json");
        let mut settings = read_settings(&settings_path)?;

        settings.ledger.default_currency = Some(self.default_currency.clone());
        settings.ledger.page_size = Some(self.page_size);
        settings.ledger.max_page_size = Some(self.max_page_size);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.max_page_size == 0 {
            bail!("page sizes must be at least 1");
        }
        if self.page_size > self.max_page_size {
            bail!(
                "pageSize ({}) cannot exceed maxPageSize ({})",
                self.page_size,
                self.max_page_size
            );
        }
        if !Account::is_currency_code(&self.default_currency) {
            bail!("defaultCurrency must be a three-letter code, got '{}'", self.default_currency);
        }
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("Invalid settings file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"theme": "dark", "ledger": {"maxPageSize": 50, "note": "keep"}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_page_size, 50);
        config.page_size = 10;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["ledger"]["note"], "keep");
        assert_eq!(saved["ledger"]["pageSize"], 10);
    }

    #[test]
    fn test_page_size_cannot_exceed_max() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ledger": {"pageSize": 500, "maxPageSize": 100}}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
