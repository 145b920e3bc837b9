use std::thread;
use std::time::Duration;

use crate::core::error::Result;

/// Bounded retry for transient store failures (lock-wait timeouts,
/// serialization conflicts). Business rejections pass straight through:
/// only errors whose class is transient are retried, with linear backoff
/// of `backoff * attempt`.
pub fn retry_transient<T>(
    max_retries: u32,
    backoff: Duration,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 0u32;
    loop {
        match f() {
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                tracing::info!(attempt, error = %err, "transient store failure, retrying");
                thread::sleep(backoff * attempt);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::types::ResourceKind;
    use std::cell::Cell;

    #[test]
    fn retries_transient_until_success() {
        let calls = Cell::new(0);
        let result = retry_transient(3, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::transient("lock timeout".to_string()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausts_after_bound() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_transient(2, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            Err(Error::transient("still busy".to_string()))
        });
        assert!(result.unwrap_err().is_transient());
        // Initial attempt plus two retries.
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn business_rejection_is_never_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_transient(3, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            Err(Error::quota_exceeded(ResourceKind::Goal, 10))
        });
        assert_eq!(calls.get(), 1);
        assert!(matches!(
            result.unwrap_err().kind,
            ErrorKind::QuotaExceeded { limit: 10 }
        ));
    }
}
