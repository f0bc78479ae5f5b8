//! Thread handles for `spawn` / `join`.
//!
//! A spawned call runs on its own OS thread with a forked interpreter. The
//! handle owns the `JoinHandle` until the first join, then caches the outcome
//! so later joins (from any thread) see the same value or error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::error::RuntimeError;
use super::value::Value;

/// Stack size for spawned evaluation threads; the evaluator recurses per call
pub const SPAWN_STACK_SIZE: usize = 64 * 1024 * 1024;

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

type Outcome = Result<Value, RuntimeError>;

/// A spawned evaluation
pub struct ThreadHandle {
    id: usize,
    join: Mutex<Option<JoinHandle<Outcome>>>,
    result: OnceLock<Outcome>,
}

impl ThreadHandle {
    /// Run `task` on a new thread and return its handle immediately
    pub fn spawn<F>(task: F) -> Result<Arc<Self>, RuntimeError>
    where
        F: FnOnce() -> Outcome + Send + 'static,
    {
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        let join = std::thread::Builder::new()
            .name(format!("omnia-spawn-{}", id))
            .stack_size(SPAWN_STACK_SIZE)
            .spawn(task)
            .map_err(|e| RuntimeError::type_error(format!("could not spawn thread: {}", e)))?;
        tracing::debug!(thread = id, "spawned");

        Ok(Arc::new(Self {
            id,
            join: Mutex::new(Some(join)),
            result: OnceLock::new(),
        }))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Block until the thread finishes; every call returns the same outcome
    pub fn join(&self) -> Outcome {
        if let Some(outcome) = self.result.get() {
            return outcome.clone();
        }

        {
            let mut slot = self.join.lock();
            if let Some(handle) = slot.take() {
                let outcome = handle.join().unwrap_or_else(|payload| {
                    let detail = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    Err(RuntimeError::type_error(format!(
                        "thread {} panicked: {}",
                        self.id, detail
                    )))
                });
                tracing::debug!(thread = self.id, ok = outcome.is_ok(), "joined");
                let _ = self.result.set(outcome);
            }
        }

        self.result.get().cloned().unwrap_or_else(|| {
            Err(RuntimeError::type_error(format!(
                "thread {} finished without a result",
                self.id
            )))
        })
    }

    /// Whether the thread has finished, without blocking
    pub fn is_done(&self) -> bool {
        if self.result.get().is_some() {
            return true;
        }
        // A joiner holding the lock is still waiting on the thread.
        self.join
            .try_lock()
            .map(|slot| slot.as_ref().map_or(true, |handle| handle.is_finished()))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("done", &self.result.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::error::ErrorKind;

    #[test]
    fn test_join_returns_value_and_caches() {
        let handle = ThreadHandle::spawn(|| Ok(Value::Int(42))).unwrap();
        assert!(matches!(handle.join(), Ok(Value::Int(42))));
        assert!(matches!(handle.join(), Ok(Value::Int(42))));
        assert!(handle.is_done());
    }

    #[test]
    fn test_join_rethrows_error() {
        let handle = ThreadHandle::spawn(|| Err(RuntimeError::thrown("boom"))).unwrap();
        let err = handle.join().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Error);
        assert_eq!(err.message, "boom");
        assert_eq!(handle.join().unwrap_err(), err);
    }

    #[test]
    fn test_panic_becomes_type_error() {
        let handle = ThreadHandle::spawn(|| panic!("kaboom")).unwrap();
        let err = handle.join().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert!(err.message.contains("kaboom"));
    }

    #[test]
    fn test_concurrent_joins_agree() {
        let handle = ThreadHandle::spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Value::str("done"))
        })
        .unwrap();
        let other = Arc::clone(&handle);
        let waiter = std::thread::spawn(move || other.join());
        let mine = handle.join();
        let theirs = waiter.join().unwrap();
        assert!(matches!(mine, Ok(Value::Str(ref s)) if s == "done"));
        assert!(matches!(theirs, Ok(Value::Str(ref s)) if s == "done"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ThreadHandle::spawn(|| Ok(Value::Unit)).unwrap();
        let b = ThreadHandle::spawn(|| Ok(Value::Unit)).unwrap();
        assert_ne!(a.id(), b.id());
        let _ = (a.join(), b.join());
    }
}
