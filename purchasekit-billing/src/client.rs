//! The billing client: a single coordinator over the store connection.
//!
//! Every collaborator (the store service handle, the main-thread
//! dispatcher, the delay scheduler) is constructor-injected, and all
//! connection and queue state lives on this one instance. There is no
//! shared global; callers hold the client reference they built at startup.
//!
//! Request flow: a caller-issued operation is dispatched immediately when
//! the connection is ready, otherwise it queues FIFO and a connect attempt
//! starts. On setup success the queue drains in order; on a retryable setup
//! failure a reconnect is scheduled with exponential backoff; on a terminal
//! failure every queued request fails with the store's code. Each dispatched
//! call carries an exactly-once gate, so the at-least-once callback
//! delivery of the platform never reaches callers twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::codes::StoreResponseCode;
use crate::connection::{ConnectionState, ConnectionStatus, SetupFailure};
use crate::dedup::OnceCallback;
use crate::dispatch::{DelayScheduler, MainThreadDispatcher};
use crate::errors::BillingError;
use crate::queue::RequestQueue;
use crate::request::{PendingRequest, ProductKind, ProductQuery, PurchaseParams, RequestId};
use crate::service::{
    ConnectionListener, FinalizeCallback, HistoryCallback, ProductsCallback, PurchasesCallback,
    StoreHistoryRecord, StoreProduct, StorePurchaseRecord, StoreService,
};
use crate::Result;

/// Observes connection lifecycle transitions of the client.
pub trait BillingStateListener: Send + Sync {
    /// Fired exactly once per successful connection.
    fn on_connected(&self);

    /// Fired when connection setup fails terminally; queued requests have
    /// already been failed with the same code.
    fn on_setup_error(&self, error: &BillingError);
}

struct ClientInner {
    service: Arc<dyn StoreService>,
    dispatcher: Arc<dyn MainThreadDispatcher>,
    scheduler: Arc<dyn DelayScheduler>,
    policy: ReconnectPolicy,
    state: Mutex<ConnectionState>,
    queue: RequestQueue,
    listener: Mutex<Option<Arc<dyn BillingStateListener>>>,
    closed: AtomicBool,
    // Serializes queue flushing: requests submitted while a flush is in
    // progress (re-entrantly or from another thread) are appended and
    // picked up by the active flusher's next drain pass, never interleaved
    // into the batch it is currently dispatching.
    flushing: AtomicBool,
}

/// Client for the native store billing service.
pub struct BillingClient {
    inner: Arc<ClientInner>,
}

impl BillingClient {
    pub fn new(
        service: Arc<dyn StoreService>,
        dispatcher: Arc<dyn MainThreadDispatcher>,
        scheduler: Arc<dyn DelayScheduler>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                service,
                dispatcher,
                scheduler,
                policy,
                state: Mutex::new(ConnectionState::new()),
                queue: RequestQueue::new(),
                listener: Mutex::new(None),
                closed: AtomicBool::new(false),
                flushing: AtomicBool::new(false),
            }),
        }
    }

    /// Register the connection state listener and kick off the first
    /// connection attempt (immediately, with no backoff delay).
    pub fn set_state_listener(&self, listener: Arc<dyn BillingStateListener>) {
        {
            let mut slot = self
                .inner
                .listener
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            *slot = Some(listener);
        }
        ClientInner::connect(&self.inner);
    }

    /// Current connection status, for host diagnostics.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .status()
    }

    /// Number of requests currently waiting for a connection.
    pub fn queued_requests(&self) -> usize {
        self.inner.queue.len()
    }

    /// Query product details for the given ids.
    pub fn query_products<S, E>(&self, ids: Vec<String>, kind: ProductKind, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<StoreProduct>) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        let request = PendingRequest::QueryProducts {
            id: RequestId::new(),
            query: ProductQuery { ids, kind },
            callback: OnceCallback::new(on_success, on_error),
        };
        ClientInner::submit(&self.inner, request);
    }

    /// Launch the store purchase flow. The store UI launch itself is routed
    /// through the main-thread dispatcher.
    pub fn purchase<S, E>(&self, params: PurchaseParams, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<StorePurchaseRecord>) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        let request = PendingRequest::LaunchPurchase {
            id: RequestId::new(),
            params,
            callback: OnceCallback::new(on_success, on_error),
        };
        ClientInner::submit(&self.inner, request);
    }

    /// Query currently owned purchases of the given product kind.
    pub fn query_purchases<S, E>(&self, kind: ProductKind, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<StorePurchaseRecord>) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        let request = PendingRequest::QueryPurchases {
            id: RequestId::new(),
            kind: kind.query_kind(),
            callback: OnceCallback::new(on_success, on_error),
        };
        ClientInner::submit(&self.inner, request);
    }

    /// Query purchase history (restore path) of the given product kind.
    pub fn query_purchase_history<S, E>(&self, kind: ProductKind, on_success: S, on_error: E)
    where
        S: FnOnce(Vec<StoreHistoryRecord>) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        let request = PendingRequest::QueryPurchaseHistory {
            id: RequestId::new(),
            kind: kind.query_kind(),
            callback: OnceCallback::new(on_success, on_error),
        };
        ClientInner::submit(&self.inner, request);
    }

    /// Consume a one-time purchase, marking it used in the store.
    pub fn consume<S, E>(&self, token: String, on_success: S, on_error: E)
    where
        S: FnOnce(()) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        let request = PendingRequest::Consume {
            id: RequestId::new(),
            token,
            callback: OnceCallback::new(on_success, on_error),
        };
        ClientInner::submit(&self.inner, request);
    }

    /// Acknowledge a purchase the store is holding open.
    pub fn acknowledge<S, E>(&self, token: String, on_success: S, on_error: E)
    where
        S: FnOnce(()) + Send + 'static,
        E: FnOnce(BillingError) + Send + 'static,
    {
        let request = PendingRequest::Acknowledge {
            id: RequestId::new(),
            token,
            callback: OnceCallback::new(on_success, on_error),
        };
        ClientInner::submit(&self.inner, request);
    }

    /// Tear down the client.
    ///
    /// Requests still queued are discarded without firing their callbacks:
    /// closing also tears down the only channel a response could arrive
    /// through. Async wrappers observe this as [`BillingError::ResponseDropped`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let discarded = self.inner.queue.discard();
        if discarded > 0 {
            debug!(discarded, "discarding queued requests on close");
        }
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_disconnected(None);
        self.inner.service.end_connection();
        info!("billing client closed");
    }

    /// Async wrapper over [`Self::query_products`].
    pub async fn query_products_async(
        &self,
        ids: Vec<String>,
        kind: ProductKind,
    ) -> Result<Vec<StoreProduct>> {
        let (tx, rx) = response_channel();
        let tx_err = Arc::clone(&tx);
        self.query_products(
            ids,
            kind,
            move |products| send_response(&tx, Ok(products)),
            move |error| send_response(&tx_err, Err(error)),
        );
        await_response(rx).await
    }

    /// Async wrapper over [`Self::query_purchases`].
    pub async fn query_purchases_async(
        &self,
        kind: ProductKind,
    ) -> Result<Vec<StorePurchaseRecord>> {
        let (tx, rx) = response_channel();
        let tx_err = Arc::clone(&tx);
        self.query_purchases(
            kind,
            move |records| send_response(&tx, Ok(records)),
            move |error| send_response(&tx_err, Err(error)),
        );
        await_response(rx).await
    }

    /// Async wrapper over [`Self::query_purchase_history`].
    pub async fn query_purchase_history_async(
        &self,
        kind: ProductKind,
    ) -> Result<Vec<StoreHistoryRecord>> {
        let (tx, rx) = response_channel();
        let tx_err = Arc::clone(&tx);
        self.query_purchase_history(
            kind,
            move |records| send_response(&tx, Ok(records)),
            move |error| send_response(&tx_err, Err(error)),
        );
        await_response(rx).await
    }

    /// Async wrapper over [`Self::consume`].
    pub async fn consume_async(&self, token: String) -> Result<()> {
        let (tx, rx) = response_channel();
        let tx_err = Arc::clone(&tx);
        self.consume(
            token,
            move |()| send_response(&tx, Ok(())),
            move |error| send_response(&tx_err, Err(error)),
        );
        await_response(rx).await
    }

    /// Async wrapper over [`Self::acknowledge`].
    pub async fn acknowledge_async(&self, token: String) -> Result<()> {
        let (tx, rx) = response_channel();
        let tx_err = Arc::clone(&tx);
        self.acknowledge(
            token,
            move |()| send_response(&tx, Ok(())),
            move |error| send_response(&tx_err, Err(error)),
        );
        await_response(rx).await
    }
}

type SharedSender<T> = Arc<Mutex<Option<oneshot::Sender<Result<T>>>>>;

fn response_channel<T>() -> (SharedSender<T>, oneshot::Receiver<Result<T>>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

fn send_response<T>(slot: &SharedSender<T>, response: Result<T>) {
    if let Some(tx) = slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
        let _ = tx.send(response);
    }
}

async fn await_response<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
    rx.await.unwrap_or(Err(BillingError::ResponseDropped))
}

/// Bridge handed to the store service as its connection listener. Holds the
/// client weakly so an abandoned client can drop even while the platform
/// retains the listener.
struct ServiceBridge {
    inner: Weak<ClientInner>,
}

impl ConnectionListener for ServiceBridge {
    fn on_setup_finished(&self, code: StoreResponseCode) {
        if let Some(inner) = self.inner.upgrade() {
            ClientInner::on_setup_finished(&inner, code);
        }
    }

    fn on_service_disconnected(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record_disconnected(Some(StoreResponseCode::ServiceDisconnected));
            // No reconnect here: the next enqueued request triggers one.
            warn!("store service disconnected");
        }
    }
}

impl ClientInner {
    fn submit(inner: &Arc<Self>, request: PendingRequest) {
        if inner.closed.load(Ordering::Acquire) {
            request.fail(BillingError::ClientClosed);
            return;
        }
        inner.queue.enqueue(request);
        if Self::is_connected(inner) {
            Self::flush(inner);
        } else {
            Self::connect(inner);
        }
    }

    fn is_connected(inner: &Arc<Self>) -> bool {
        let state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.status() == ConnectionStatus::Connected
    }

    fn connect(inner: &Arc<Self>) {
        if inner.closed.load(Ordering::Acquire) {
            return;
        }
        let proceed = {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.begin_connecting()
        };
        if !proceed {
            return;
        }
        debug!("starting store service connection");
        let bridge: Arc<dyn ConnectionListener> = Arc::new(ServiceBridge {
            inner: Arc::downgrade(inner),
        });
        inner.service.start_connection(bridge);
    }

    fn on_setup_finished(inner: &Arc<Self>, code: StoreResponseCode) {
        if code == StoreResponseCode::Ok {
            let transitioned = {
                let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
                state.record_connected()
            };
            if !transitioned {
                return;
            }
            info!("store service connected");
            if let Some(listener) = inner.current_listener() {
                listener.on_connected();
            }
            Self::flush(inner);
            return;
        }

        let outcome = {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.record_setup_failure(code, &inner.policy)
        };
        match outcome {
            SetupFailure::Retry(delay) => {
                warn!(
                    code = code.description(),
                    delay_ms = delay.as_millis() as u64,
                    "billing setup failed, retrying"
                );
                let weak = Arc::downgrade(inner);
                inner.scheduler.schedule(
                    delay,
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            Self::connect(&inner);
                        }
                    }),
                );
            }
            SetupFailure::Terminal => {
                let error = BillingError::SetupFailed { code };
                warn!(code = code.description(), "billing setup failed terminally");
                if let Some(listener) = inner.current_listener() {
                    listener.on_setup_error(&error);
                }
                inner.queue.fail_all(&error);
            }
            SetupFailure::Ignored => {}
        }
    }

    fn flush(inner: &Arc<Self>) {
        if inner.flushing.swap(true, Ordering::SeqCst) {
            return;
        }
        loop {
            if !Self::is_connected(inner) {
                break;
            }
            let batch = inner.queue.drain();
            if batch.is_empty() {
                break;
            }
            debug!(count = batch.len(), "flushing queued requests");
            let mut iter = batch.into_iter();
            while let Some(request) = iter.next() {
                if !Self::is_connected(inner) {
                    // Connection dropped mid-flush: keep the remainder at
                    // the head, ahead of anything enqueued since.
                    let mut rest = vec![request];
                    rest.extend(iter);
                    inner.queue.requeue_front(rest);
                    break;
                }
                Self::dispatch(inner, request);
            }
        }
        inner.flushing.store(false, Ordering::SeqCst);
        // A submission or reconnect may have raced the flag release; pick
        // that work up instead of stranding it until the next request.
        if Self::is_connected(inner) && !inner.queue.is_empty() {
            Self::flush(inner);
        }
    }

    fn dispatch(inner: &Arc<Self>, request: PendingRequest) {
        debug!(
            id = %request.id(),
            kind = request.kind_name(),
            "dispatching store request"
        );
        match request {
            PendingRequest::QueryProducts {
                query, callback, ..
            } => {
                let on_result: ProductsCallback = Arc::new(move |code, products| match code {
                    StoreResponseCode::Ok => {
                        callback.succeed(products);
                    }
                    other => {
                        callback.fail(BillingError::from_store_code(other, "query products"));
                    }
                });
                inner.service.query_product_details(query, on_result);
            }
            PendingRequest::LaunchPurchase {
                params, callback, ..
            } => {
                let on_result: PurchasesCallback = Arc::new(move |code, purchases| match code {
                    StoreResponseCode::Ok => {
                        callback.succeed(purchases);
                    }
                    other => {
                        callback.fail(BillingError::from_store_code(other, "purchase flow"));
                    }
                });
                // The purchase UI must launch from the main thread; the
                // calling thread does not wait for it.
                let service = Arc::clone(&inner.service);
                inner.dispatcher.dispatch(Box::new(move || {
                    service.launch_purchase_flow(params, on_result);
                }));
            }
            PendingRequest::QueryPurchases { kind, callback, .. } => {
                let on_result: PurchasesCallback = Arc::new(move |code, records| match code {
                    StoreResponseCode::Ok => {
                        callback.succeed(records);
                    }
                    other => {
                        callback.fail(BillingError::from_store_code(other, "query purchases"));
                    }
                });
                inner.service.query_purchases(kind, on_result);
            }
            PendingRequest::QueryPurchaseHistory { kind, callback, .. } => {
                let on_result: HistoryCallback = Arc::new(move |code, records| match code {
                    StoreResponseCode::Ok => {
                        callback.succeed(records);
                    }
                    other => {
                        callback
                            .fail(BillingError::from_store_code(other, "query purchase history"));
                    }
                });
                inner.service.query_purchase_history(kind, on_result);
            }
            PendingRequest::Consume {
                token, callback, ..
            } => {
                let on_result: FinalizeCallback = Arc::new(move |code| match code {
                    StoreResponseCode::Ok => {
                        callback.succeed(());
                    }
                    other => {
                        callback.fail(BillingError::from_store_code(other, "consume"));
                    }
                });
                inner.service.consume(token, on_result);
            }
            PendingRequest::Acknowledge {
                token, callback, ..
            } => {
                let on_result: FinalizeCallback = Arc::new(move |code| match code {
                    StoreResponseCode::Ok => {
                        callback.succeed(());
                    }
                    other => {
                        callback.fail(BillingError::from_store_code(other, "acknowledge"));
                    }
                });
                inner.service.acknowledge(token, on_result);
            }
        }
    }

    fn current_listener(&self) -> Option<Arc<dyn BillingStateListener>> {
        self.listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
