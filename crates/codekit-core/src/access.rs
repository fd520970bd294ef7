//! Access Control
//!
//! Plan tiers, caller identity, and the free-tier daily usage meter.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{GatewayError, Result};
use crate::prompt::ToolId;

/// Subscription tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }

    /// Whether this tier may invoke `tool`
    pub const fn allows(self, tool: ToolId) -> bool {
        matches!(self, Self::Pro) || !tool.is_pro()
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity forwarded by the external auth provider
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub email: Option<String>,

    /// Client address as reported by the fronting proxy
    pub client: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Key used for usage accounting
    ///
    /// Signed-in users are counted by user id and anonymous visitors by
    /// client address. `None` when neither is known; such calls are not metered.
    pub fn usage_key(&self) -> Option<String> {
        match (&self.user_id, &self.client) {
            (Some(user_id), _) => Some(user_id.clone()),
            (None, Some(client)) => Some(format!("client:{client}")),
            (None, None) => None,
        }
    }
}

/// Resolves a caller's current tier
///
/// Looked up on every request so that webhook-driven changes apply
/// immediately.
#[async_trait]
pub trait TierResolver: Send + Sync {
    async fn tier_for(&self, caller: &Caller) -> Result<Tier>;
}

/// Counts for a single UTC day; replaced wholesale when the day changes
#[derive(Debug, Default)]
struct DailyUsage {
    day: Option<NaiveDate>,
    counts: HashMap<String, HashMap<ToolId, u32>>,
}

impl DailyUsage {
    fn roll_to(&mut self, day: NaiveDate) {
        if self.day != Some(day) {
            self.day = Some(day);
            self.counts.clear();
        }
    }
}

/// In-memory per-caller, per-tool counter that resets each UTC day
#[derive(Debug, Default)]
pub struct UsageMeter {
    usage: Mutex<DailyUsage>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `limit`, refusing once it is reached
    pub fn check_and_increment(&self, key: &str, tool: ToolId, limit: u32) -> Result<u32> {
        self.check_and_increment_on(Utc::now().date_naive(), key, tool, limit)
    }

    pub(crate) fn check_and_increment_on(
        &self,
        day: NaiveDate,
        key: &str,
        tool: ToolId,
        limit: u32,
    ) -> Result<u32> {
        let mut usage = self.lock()?;
        usage.roll_to(day);

        let count = usage
            .counts
            .entry(key.to_string())
            .or_default()
            .entry(tool)
            .or_insert(0);
        if *count >= limit {
            return Err(GatewayError::QuotaExceeded {
                tool: tool.to_string(),
                limit,
            });
        }

        *count += 1;
        Ok(limit - *count)
    }

    /// Give back a request that never reached the provider successfully
    pub fn refund(&self, key: &str, tool: ToolId) -> Result<()> {
        let mut usage = self.lock()?;
        if let Some(count) = usage.counts.get_mut(key).and_then(|c| c.get_mut(&tool)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    /// Today's counts for a caller
    pub fn today(&self, key: &str) -> Result<HashMap<ToolId, u32>> {
        self.usage_on(Utc::now().date_naive(), key)
    }

    fn usage_on(&self, day: NaiveDate, key: &str) -> Result<HashMap<ToolId, u32>> {
        let usage = self.lock()?;
        if usage.day != Some(day) {
            return Ok(HashMap::new());
        }
        Ok(usage.counts.get(key).cloned().unwrap_or_default())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DailyUsage>> {
        self.usage
            .lock()
            .map_err(|_| GatewayError::Other("usage meter lock poisoned".into()))
    }
}
