//! Exactly-once completion gate for in-flight store calls.
//!
//! The store service delivers completions at-least-once, from arbitrary
//! threads, sometimes concurrently. `OnceCallback` guarantees the caller's
//! continuation fires exactly once: the first completion wins an atomic
//! compare-and-set and every later delivery is silently dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::BillingError;

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type ErrorFn = Box<dyn FnOnce(BillingError) + Send>;

struct OnceInner<T> {
    completed: AtomicBool,
    // Taken by whichever completion wins the gate. The mutex is only the
    // container for the continuations; the gate itself is the atomic.
    continuations: Mutex<Option<(SuccessFn<T>, ErrorFn)>>,
}

/// One-shot success/error callback pair, safe to invoke from any number of
/// threads. Cloning yields another handle onto the same gate.
pub struct OnceCallback<T> {
    inner: Arc<OnceInner<T>>,
}

impl<T> Clone for OnceCallback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> OnceCallback<T> {
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        Self {
            inner: Arc::new(OnceInner {
                completed: AtomicBool::new(false),
                continuations: Mutex::new(Some((Box::new(on_success), Box::new(on_error)))),
            }),
        }
    }

    /// Deliver a successful completion. Returns true if this call won the
    /// gate, false if a completion had already been delivered.
    pub fn succeed(&self, value: T) -> bool {
        match self.take_continuations() {
            Some((on_success, _)) => {
                on_success(value);
                true
            }
            None => false,
        }
    }

    /// Deliver a failed completion. Returns true if this call won the gate.
    pub fn fail(&self, error: BillingError) -> bool {
        match self.take_continuations() {
            Some((_, on_error)) => {
                on_error(error);
                true
            }
            None => false,
        }
    }

    /// Whether a completion has already been delivered.
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    fn take_continuations(&self) -> Option<(SuccessFn<T>, ErrorFn)> {
        // The compare-and-set decides the winner; a plain read-then-write
        // would let two racing threads both observe `false` and deliver
        // twice.
        if self
            .inner
            .completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.inner
            .continuations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    #[test]
    fn success_fires_once() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = Arc::clone(&hits);
        let cb = OnceCallback::new(
            move |v: u32| {
                hits_clone.fetch_add(v, Ordering::SeqCst);
            },
            |_| panic!("error path must not fire"),
        );

        assert!(cb.succeed(1));
        assert!(!cb.succeed(1));
        assert!(!cb.fail(BillingError::ClientClosed));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(cb.is_completed());
    }

    #[test]
    fn error_closes_the_gate_for_success() {
        let errors = Arc::new(AtomicU32::new(0));
        let errors_clone = Arc::clone(&errors);
        let cb = OnceCallback::new(
            |_: u32| panic!("success path must not fire"),
            move |_| {
                errors_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(cb.fail(BillingError::ClientClosed));
        assert!(!cb.succeed(7));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_deliveries_produce_exactly_one_win() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = Arc::clone(&hits);
        let cb = OnceCallback::new(
            move |_: u32| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            {
                let hits = Arc::clone(&hits);
                move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let cb = cb.clone();
            handles.push(thread::spawn(move || {
                if i % 2 == 0 {
                    cb.succeed(i)
                } else {
                    cb.fail(BillingError::ClientClosed)
                }
            }));
        }

        let wins: u32 = handles
            .into_iter()
            .map(|h| u32::from(h.join().unwrap()))
            .sum();
        assert_eq!(wins, 1, "exactly one thread must win the gate");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
