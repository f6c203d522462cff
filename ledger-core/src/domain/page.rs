//! Paging and filtering for history queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Limit/offset window over a reverse-chronological listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Reject empty pages and pages larger than `max_limit`
    pub fn validate(&self, max_limit: usize) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::validation("limit must be at least 1"));
        }
        if self.limit > max_limit {
            return Err(Error::validation(format!("limit cannot exceed {}", max_limit)));
        }
        Ok(())
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

/// History query for one account: optional time window plus a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// Inclusive lower bound on creation time
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on creation time
    pub until: Option<DateTime<Utc>>,
    pub page: Page,
}

impl TransactionQuery {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            page: Page::new(limit, offset),
            ..Default::default()
        }
    }

    pub fn with_window(
        mut self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn matches(&self, created_at: &DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| *created_at >= s) && self.until.map_or(true, |u| *created_at < u)
    }

    pub fn validate(&self, max_limit: usize) -> Result<()> {
        self.page.validate(max_limit)?;
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since >= until {
                return Err(Error::validation("'since' must be earlier than 'until'"));
            }
        }
        Ok(())
    }
}
