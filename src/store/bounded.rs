use crate::errors::{Error, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Run a store lookup on a helper thread and wait at most `timeout`.
///
/// On timeout the helper is left to finish on its own and its result is
/// dropped; the caller gets `Error::Timeout` and degrades the step.
pub fn bounded_lookup<T, F>(operation: &str, timeout: Duration, lookup: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = channel::bounded(1);
    thread::Builder::new()
        .name(format!("lookup:{}", operation))
        .spawn(move || {
            // Receiver may already be gone after a timeout
            let _ = tx.send(lookup());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(
                "{} did not finish within {}ms",
                operation,
                timeout.as_millis()
            );
            Err(Error::timeout(operation, timeout.as_millis() as u64))
        }
        Err(RecvTimeoutError::Disconnected) => Err(Error::Store(format!(
            "{} lookup ended without a result",
            operation
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_lookup_returns_value() {
        let value = bounded_lookup("fast", Duration::from_secs(5), || Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_lookup_error_is_propagated() {
        let err = bounded_lookup::<(), _>("failing", Duration::from_secs(5), || {
            Err(Error::Store("down".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_slow_lookup_times_out() {
        let err = bounded_lookup("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(1)
        })
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_panicking_lookup_is_store_error() {
        let err = bounded_lookup::<(), _>("panics", Duration::from_secs(5), || {
            panic!("backend exploded")
        })
        .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
