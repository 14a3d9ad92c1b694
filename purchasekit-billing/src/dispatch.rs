//! Injected executor capabilities.
//!
//! Two narrow capabilities are injected into the client instead of an
//! ambient runtime: a main-thread hop for the one store entry point that
//! requires it (launching the purchase UI), and a delay scheduler for
//! reconnect backoff timers. Neither blocks the calling thread.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::sleep;

/// Runs a task on the host application's main/UI thread.
pub trait MainThreadDispatcher: Send + Sync {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs a task after a delay, off the calling thread.
pub trait DelayScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>);
}

/// Dispatcher that runs tasks inline on the calling thread.
///
/// Suitable for tests and for hosts whose store adapter already marshals
/// onto the right thread internally.
pub struct InlineDispatcher;

impl MainThreadDispatcher for InlineDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Scheduler backed by a tokio runtime handle.
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is currently inside.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime context.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl DelayScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn inline_dispatcher_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        InlineDispatcher.dispatch(Box::new(move || {
            ran_clone.store(true, Ordering::SeqCst);
        }));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_after_delay() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let scheduler = TokioScheduler::current();
        scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        rx.await.expect("scheduled task must run");
    }
}
