//! Billing-state reconciliation engine.
//!
//! Bridges the asynchronous, callback-based, connection-oriented native
//! billing client to a deferred-request queue with exponential-backoff
//! reconnection and exactly-once response delivery.
//!
//! The store service itself is an injected collaborator ([`StoreService`]);
//! this crate owns the reconciliation logic:
//!
//! - **Connection lifecycle**: disconnected/connecting/connected with a
//!   consecutive-failure count that resets only on a successful connection.
//! - **Request queueing**: operations issued before the connection is ready
//!   wait in FIFO order and drain on connect; no request is dropped or
//!   dispatched twice.
//! - **Exactly-once delivery**: the platform may invoke completion
//!   callbacks more than once, from any thread; each logical request's
//!   `on_success`/`on_error` pair fires exactly once.
//! - **Backoff reconnection**: retryable setup failures reconnect with
//!   capped exponential backoff; terminal failures fail every queued
//!   request with the store's code and schedule nothing.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use purchasekit_billing::{
//!     BillingClient, InlineDispatcher, ProductKind, ReconnectPolicy, TokioScheduler,
//! };
//!
//! let client = BillingClient::new(
//!     store_adapter,                       // Arc<dyn StoreService>
//!     Arc::new(InlineDispatcher),
//!     Arc::new(TokioScheduler::current()),
//!     ReconnectPolicy::default(),
//! );
//! client.query_products(
//!     vec!["premium_monthly".into()],
//!     ProductKind::Subscription,
//!     |products| println!("{} products", products.len()),
//!     |error| eprintln!("query failed: {error}"),
//! );
//! ```

pub mod backoff;
pub mod client;
pub mod codes;
pub mod connection;
pub mod dedup;
pub mod dispatch;
pub mod errors;
pub mod queue;
pub mod request;
pub mod service;

pub use backoff::ReconnectPolicy;
pub use client::{BillingClient, BillingStateListener};
pub use codes::StoreResponseCode;
pub use connection::{ConnectionState, ConnectionStatus, SetupFailure};
pub use dedup::OnceCallback;
pub use dispatch::{DelayScheduler, InlineDispatcher, MainThreadDispatcher, TokioScheduler};
pub use errors::{BillingError, BillingErrorCode};
pub use queue::RequestQueue;
pub use request::{
    ActivityHandle, PendingRequest, ProductKind, ProductQuery, PurchaseParams, QueryKind, RequestId,
};
pub use service::{
    ConnectionListener, FinalizeCallback, HistoryCallback, ProductsCallback, PurchasesCallback,
    StoreHistoryRecord, StoreProduct, StorePurchaseRecord, StoreService,
};

/// Common result alias for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;
