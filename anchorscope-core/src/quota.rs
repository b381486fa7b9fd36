// Per-caller daily request budget

use crate::error::{AnalysisError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuota {
    pub remaining_requests: u32,
    pub reset_at: DateTime<Utc>,
}

impl UsageQuota {
    pub fn fresh(limit: u32, now: DateTime<Utc>, window: Duration) -> Self {
        let window = TimeDelta::from_std(window).unwrap_or_else(|_| TimeDelta::days(1));
        Self {
            remaining_requests: limit,
            reset_at: now + window,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_requests == 0
    }

    pub fn reset_time(&self) -> String {
        self.reset_at.to_rfc3339()
    }
}

/// Persistence for quotas, keyed by caller identity.
///
/// `try_consume` and `refund` must each be atomic with respect to other
/// callers of the same store.
pub trait QuotaStore {
    fn load(&self, caller: &str) -> Result<Option<UsageQuota>>;
    fn save(&self, caller: &str, quota: &UsageQuota) -> Result<()>;

    /// Take one request from the caller's quota, starting from `fresh` when
    /// there is no quota yet or its window ended before `now`. Returns `None`
    /// and consumes nothing when the quota is exhausted.
    fn try_consume(
        &self,
        caller: &str,
        fresh: &UsageQuota,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageQuota>>;

    /// Give back one request, never exceeding `limit`. A quota whose window
    /// has ended is left alone.
    fn refund(&self, caller: &str, limit: u32, now: DateTime<Utc>) -> Result<()>;
}

impl<T: QuotaStore + ?Sized> QuotaStore for &T {
    fn load(&self, caller: &str) -> Result<Option<UsageQuota>> {
        (**self).load(caller)
    }

    fn save(&self, caller: &str, quota: &UsageQuota) -> Result<()> {
        (**self).save(caller, quota)
    }

    fn try_consume(
        &self,
        caller: &str,
        fresh: &UsageQuota,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageQuota>> {
        (**self).try_consume(caller, fresh, now)
    }

    fn refund(&self, caller: &str, limit: u32, now: DateTime<Utc>) -> Result<()> {
        (**self).refund(caller, limit, now)
    }
}

/// In-process store; quotas are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryQuotaStore {
    quotas: Mutex<HashMap<String, UsageQuota>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, UsageQuota>>> {
        self.quotas
            .lock()
            .map_err(|e| AnalysisError::Storage(e.to_string()))
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn load(&self, caller: &str) -> Result<Option<UsageQuota>> {
        Ok(self.lock()?.get(caller).copied())
    }

    fn save(&self, caller: &str, quota: &UsageQuota) -> Result<()> {
        self.lock()?.insert(caller.to_string(), *quota);
        Ok(())
    }

    fn try_consume(
        &self,
        caller: &str,
        fresh: &UsageQuota,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageQuota>> {
        let mut quotas = self.lock()?;
        let quota = quotas.entry(caller.to_string()).or_insert(*fresh);
        if now >= quota.reset_at {
            *quota = *fresh;
        }
        if quota.is_exhausted() {
            return Ok(None);
        }
        quota.remaining_requests -= 1;
        Ok(Some(*quota))
    }

    fn refund(&self, caller: &str, limit: u32, now: DateTime<Utc>) -> Result<()> {
        if let Some(quota) = self.lock()?.get_mut(caller) {
            if now < quota.reset_at {
                quota.remaining_requests = quota.remaining_requests.saturating_add(1).min(limit);
            }
        }
        Ok(())
    }
}

/// Admission control on top of a [`QuotaStore`].
///
/// A request is reserved when it is admitted and handed back when the call
/// ends without doing chargeable work. The window is rolling: it starts at
/// the first reservation after the previous window expired.
pub struct QuotaGate<S: QuotaStore> {
    store: S,
    limit: u32,
    window: Duration,
}

impl<S: QuotaStore> QuotaGate<S> {
    pub fn new(store: S, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The caller's quota as of `now`, with an expired window already reset.
    pub fn current(&self, caller: &str, now: DateTime<Utc>) -> Result<UsageQuota> {
        match self.store.load(caller)? {
            Some(quota) if now < quota.reset_at => Ok(quota),
            _ => Ok(UsageQuota::fresh(self.limit, now, self.window)),
        }
    }

    /// Take one request for the caller, or fail with `QuotaExceeded`.
    pub fn reserve(&self, caller: &str, now: DateTime<Utc>) -> Result<UsageQuota> {
        let fresh = UsageQuota::fresh(self.limit, now, self.window);
        match self.store.try_consume(caller, &fresh, now)? {
            Some(quota) => {
                debug!(
                    "Reserved for {}: {} requests left until {}",
                    caller,
                    quota.remaining_requests,
                    quota.reset_time()
                );
                Ok(quota)
            }
            None => {
                let quota = self.current(caller, now)?;
                debug!("Rejecting {}: quota exhausted until {}", caller, quota.reset_time());
                Err(AnalysisError::QuotaExceeded {
                    reset_at: quota.reset_at,
                })
            }
        }
    }

    /// Return a request taken by [`QuotaGate::reserve`].
    pub fn refund(&self, caller: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.refund(caller, self.limit, now)?;
        debug!("Refunded one request to {}", caller);
        Ok(())
    }
}
