//! The store-service abstraction.
//!
//! This crate never talks to a store SDK directly; a host-provided
//! implementation of [`StoreService`] wraps the native billing client. The
//! only semantics this crate relies on are the ones the platform actually
//! provides: callbacks are delivered at-least-once, on unspecified threads,
//! with no ordering guarantee across distinct request types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codes::StoreResponseCode;
use crate::request::{ProductQuery, PurchaseParams, QueryKind};

/// Callback for product-details queries. The store may invoke it more than
/// once; the client's exactly-once gate absorbs duplicates.
pub type ProductsCallback = Arc<dyn Fn(StoreResponseCode, Vec<StoreProduct>) + Send + Sync>;
/// Callback for purchase-flow and owned-purchase queries.
pub type PurchasesCallback = Arc<dyn Fn(StoreResponseCode, Vec<StorePurchaseRecord>) + Send + Sync>;
/// Callback for purchase-history queries.
pub type HistoryCallback = Arc<dyn Fn(StoreResponseCode, Vec<StoreHistoryRecord>) + Send + Sync>;
/// Callback for consume/acknowledge calls.
pub type FinalizeCallback = Arc<dyn Fn(StoreResponseCode) + Send + Sync>;

/// Receives connection lifecycle callbacks from the store service.
pub trait ConnectionListener: Send + Sync {
    /// The platform finished a connection attempt; `Ok` means connected.
    fn on_setup_finished(&self, code: StoreResponseCode);

    /// The platform severed an established connection.
    fn on_service_disconnected(&self);
}

/// Narrow interface over the native billing service client.
///
/// Implementations must tolerate being called from any thread; the launch
/// of the purchase UI is the one entry point the client routes through the
/// main-thread dispatcher first.
pub trait StoreService: Send + Sync {
    fn start_connection(&self, listener: Arc<dyn ConnectionListener>);
    fn end_connection(&self);
    fn is_ready(&self) -> bool;

    fn query_product_details(&self, query: ProductQuery, on_result: ProductsCallback);
    /// Present the store purchase UI and report the resulting purchases.
    /// The implementation is responsible for correlating the store's
    /// purchases-updated delivery back to this launched flow.
    fn launch_purchase_flow(&self, params: PurchaseParams, on_result: PurchasesCallback);
    fn query_purchases(&self, kind: QueryKind, on_result: PurchasesCallback);
    fn query_purchase_history(&self, kind: QueryKind, on_result: HistoryCallback);
    fn consume(&self, token: String, on_result: FinalizeCallback);
    fn acknowledge(&self, token: String, on_result: FinalizeCallback);
}

/// A product as reported by the store's details query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreProduct {
    pub id: String,
    pub kind: crate::request::ProductKind,
    pub title: String,
    pub description: String,
    /// Price in micro-units of `currency`.
    pub price_micros: i64,
    pub currency: String,
    /// Base plan the price belongs to, for subscriptions.
    pub base_plan_id: Option<String>,
    /// Offer within the base plan, when one applies.
    pub offer_id: Option<String>,
}

/// An owned purchase as reported by the store (purchase flow completion or
/// owned-purchases query).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePurchaseRecord {
    pub order_id: Option<String>,
    /// Product ids covered by this purchase; more than one means a
    /// multi-line purchase.
    pub product_ids: Vec<String>,
    pub purchase_time_millis: i64,
    pub purchase_token: String,
    /// Raw numeric purchase state as the store reports it
    /// (0 unspecified, 1 purchased, 2 pending).
    pub purchase_state_raw: i32,
    pub is_auto_renewing: Option<bool>,
    /// Store-reported acknowledge/consume state, not the dedup cache's view.
    pub is_acknowledged: bool,
    pub signature: Option<String>,
    /// Base plan the purchase was made under, when the flow knows it.
    pub base_plan_id: Option<String>,
    pub offer_id: Option<String>,
    /// The store's raw record, kept for diagnostics only.
    pub raw_json: serde_json::Value,
}

/// A purchase-history record (restore path). History records carry less
/// than live purchases: no order id, no acknowledge state, no renewal flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHistoryRecord {
    pub product_ids: Vec<String>,
    pub purchase_time_millis: i64,
    pub purchase_token: String,
    pub signature: Option<String>,
    pub raw_json: serde_json::Value,
}

/// Raw purchase-state constants used in [`StorePurchaseRecord`].
pub mod purchase_state_raw {
    pub const UNSPECIFIED: i32 = 0;
    pub const PURCHASED: i32 = 1;
    pub const PENDING: i32 = 2;
}
