use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};

use crate::core::error::{Error, Result};
use crate::store::tables::{QuotaKey, Tables};

/// Embedded transactional store.
///
/// Reads take a shared snapshot of the tables; write transactions take the
/// exclusive lock, so every mutation observes and commits a serial state.
/// Lock waits are bounded by `op_timeout` and surface as the transient error
/// class, which the quota coordinator retries.
pub struct Engine {
    tables: RwLock<Tables>,
    quota_locks: Mutex<HashMap<QuotaKey, Arc<Mutex<()>>>>,
    op_timeout: Duration,
}

/// Exclusive lock on one quota counter row. Held across the whole creation
/// transaction so concurrent creators for the same (user, kind, day) key
/// serialize, while unrelated keys proceed in parallel.
pub struct QuotaRowGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl Engine {
    pub fn new(op_timeout: Duration) -> Self {
        Engine {
            tables: RwLock::new(Tables::default()),
            quota_locks: Mutex::new(HashMap::new()),
            op_timeout,
        }
    }

    /// Runs a read-only closure against a consistent snapshot of the tables.
    pub fn snapshot<T>(&self, f: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        let guard = self
            .tables
            .try_read_for(self.op_timeout)
            .ok_or_else(|| Error::transient("timed out waiting for read snapshot".to_string()))?;
        f(&guard)
    }

    /// Runs a closure as one atomic transaction. On `Err` every mutation the
    /// closure made is rolled back; on `Ok` the new state commits as a unit.
    pub fn with_tx<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self
            .tables
            .try_write_for(self.op_timeout)
            .ok_or_else(|| Error::transient("timed out waiting for write transaction".to_string()))?;

        let rollback = guard.clone();
        match f(&mut guard) {
            Ok(value) => Ok(value),
            Err(err) => {
                *guard = rollback;
                Err(err)
            }
        }
    }

    /// Acquires the row lock for one quota counter, creating the lock cell
    /// lazily on first use of the key.
    pub fn lock_quota_row(&self, key: QuotaKey) -> Result<QuotaRowGuard> {
        let cell = {
            let mut locks = self.quota_locks.lock();
            locks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = cell.try_lock_arc_for(self.op_timeout).ok_or_else(|| {
            Error::transient(format!(
                "timed out waiting for quota row lock ({} {} {})",
                key.user, key.kind, key.day
            ))
        })?;

        Ok(QuotaRowGuard { _guard: guard })
    }
}
