//! Small helpers shared by the controllers.

use futures::{FutureExt, select};
use futures_timer::Delay;
use std::future::Future;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::Result;
use crate::api::models::BluetoothError;

/// Runs `fut` with a deadline (runtime-agnostic).
///
/// Returns `BluetoothError::Timeout` naming `what` if the deadline passes
/// first. The inner future is dropped on timeout.
pub(crate) async fn with_timeout<F, T>(what: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let mut fut = pin!(fut.fuse());
    let mut deadline = pin!(Delay::new(timeout).fuse());

    select! {
        res = fut => res,
        _ = deadline => Err(BluetoothError::Timeout(format!("{what} after {timeout:?}"))),
    }
}

/// Sleeps for `duration`. A zero duration returns immediately.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        Delay::new(duration).await;
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// The guarded structures are plain caches that are always left consistent
/// between statements, so a poisoned lock carries no torn state.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {}", $context, e);
                return None;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ErrorKind;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let res = with_timeout("quick", Duration::from_secs(5), async { Ok(7) }).await;
        assert_eq!(res.ok(), Some(7));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let res: Result<()> = with_timeout(
            "slow",
            Duration::from_millis(10),
            futures::future::pending(),
        )
        .await;
        let err = res.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("slow"));
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let m = std::sync::Arc::new(Mutex::new(1));
        let m2 = m.clone();
        let _ = std::thread::spawn(move || {
            let _g = m2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        assert_eq!(*lock(&m), 1);
    }
}
