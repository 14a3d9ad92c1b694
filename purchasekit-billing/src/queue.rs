//! FIFO queue of requests awaiting a ready connection.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::errors::BillingError;
use crate::request::PendingRequest;

/// Ordered collection of requests issued before the connection was ready.
///
/// All access goes through an internal mutex; requests keep their enqueue
/// order across kinds. A drained request is no longer tracked here;
/// ownership moves to the in-flight call.
pub struct RequestQueue {
    pending: Mutex<VecDeque<PendingRequest>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a request to the tail.
    pub fn enqueue(&self, request: PendingRequest) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push_back(request);
    }

    /// Take every currently queued request, in enqueue order.
    ///
    /// The whole deque is swapped out under the lock, so requests enqueued
    /// re-entrantly while the drained batch is being dispatched land in the
    /// fresh deque and are picked up by a later drain pass, never
    /// interleaved with the current batch.
    pub fn drain(&self) -> Vec<PendingRequest> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending).into()
    }

    /// Put an undispatched remainder of a drained batch back at the head,
    /// preserving its internal order ahead of anything enqueued since.
    pub fn requeue_front(&self, requests: Vec<PendingRequest>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for request in requests.into_iter().rev() {
            pending.push_front(request);
        }
    }

    /// Deliver `error` to every queued request and clear the queue.
    pub fn fail_all(&self, error: &BillingError) {
        for request in self.drain() {
            request.fail(error.clone());
        }
    }

    /// Drop every queued request without firing any callback.
    ///
    /// Used on close: tearing the client down also tears down the only
    /// channel a response could ever arrive through, so the discarded
    /// requests are documented as silent.
    pub fn discard(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let discarded = pending.len();
        pending.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::OnceCallback;
    use crate::request::{PendingRequest, QueryKind, RequestId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn consume_request(counter: Arc<AtomicU32>) -> PendingRequest {
        PendingRequest::Consume {
            id: RequestId::new(),
            token: "token".into(),
            callback: OnceCallback::new(
                |_| {},
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            ),
        }
    }

    #[test]
    fn drain_preserves_enqueue_order() {
        let queue = RequestQueue::new();
        queue.enqueue(PendingRequest::QueryPurchases {
            id: RequestId::new(),
            kind: QueryKind::Subscription,
            callback: OnceCallback::new(|_| {}, |_| {}),
        });
        queue.enqueue(PendingRequest::Consume {
            id: RequestId::new(),
            token: "t".into(),
            callback: OnceCallback::new(|_| {}, |_| {}),
        });

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind_name(), "query_purchases");
        assert_eq!(drained[1].kind_name(), "consume");
        assert!(queue.is_empty());
    }

    #[test]
    fn fail_all_reaches_every_request() {
        let queue = RequestQueue::new();
        let errors = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            queue.enqueue(consume_request(Arc::clone(&errors)));
        }

        queue.fail_all(&BillingError::ClientClosed);
        assert_eq!(errors.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn discard_fires_no_callbacks() {
        let queue = RequestQueue::new();
        let errors = Arc::new(AtomicU32::new(0));
        queue.enqueue(consume_request(Arc::clone(&errors)));
        queue.enqueue(consume_request(Arc::clone(&errors)));

        assert_eq!(queue.discard(), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }
}
