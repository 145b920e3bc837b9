use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::core::error::{Error, Result};
use crate::core::types::{ResourceKind, UserId};
use crate::quota::retry::retry_transient;
use crate::store::engine::Engine;
use crate::store::tables::{QuotaKey, Tables};

/// Gates creation operations behind a per-user, per-kind, per-UTC-day
/// counter. The counter row is the single place the store uses pessimistic
/// locking: without it, two creators could both read usage below the limit
/// and both commit.
#[derive(Clone)]
pub struct QuotaCoordinator {
    engine: Arc<Engine>,
    max_retries: u32,
    backoff: Duration,
}

impl QuotaCoordinator {
    pub fn new(engine: Arc<Engine>, max_retries: u32, backoff: Duration) -> Self {
        QuotaCoordinator {
            engine,
            max_retries,
            backoff,
        }
    }

    /// Runs `insert_fn` inside one transaction gated by the day's counter:
    /// ensure the counter row exists, lock it, read usage, reject with
    /// `QuotaExceeded` when the limit is reached, insert, increment, commit.
    /// Transient store failures are retried up to the configured bound; the
    /// quota rejection is final.
    pub fn create_under_quota<T>(
        &self,
        user: UserId,
        kind: ResourceKind,
        limit: u32,
        insert_fn: impl Fn(&mut Tables) -> Result<T>,
    ) -> Result<T> {
        self.create_on_day(user, kind, limit, Utc::now().date_naive(), insert_fn)
    }

    pub(crate) fn create_on_day<T>(
        &self,
        user: UserId,
        kind: ResourceKind,
        limit: u32,
        day: NaiveDate,
        insert_fn: impl Fn(&mut Tables) -> Result<T>,
    ) -> Result<T> {
        let key = QuotaKey { user, kind, day };

        retry_transient(self.max_retries, self.backoff, || {
            // The row lock is taken before the transaction starts and held
            // until it commits, serializing creators on this key only.
            let _row = self.engine.lock_quota_row(key)?;

            self.engine.with_tx(|tables| {
                let usage = *tables.quotas.entry(key).or_insert(0);
                if usage >= limit {
                    return Err(Error::quota_exceeded(kind, limit));
                }

                let created = insert_fn(tables)?;

                if let Some(counter) = tables.quotas.get_mut(&key) {
                    *counter += 1;
                }

                Ok(created)
            })
        })
    }
}
