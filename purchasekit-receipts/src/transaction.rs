//! The canonical purchase record.
//!
//! Every store-specific purchase shape normalizes into [`StoreTransaction`],
//! a single tagged type discriminated by [`SourceStore`]. Transactions are
//! immutable once built; progression (acknowledged, posted) is tracked in
//! the posted-token cache, never on the record itself.

use std::hash::{Hash, Hasher};

use purchasekit_billing::service::purchase_state_raw;
use serde::{Deserialize, Serialize};

/// Which store, and which path through it, produced a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceStore {
    /// A live Google Play purchase (purchase flow or owned-purchases query).
    GooglePurchase,
    /// A Google Play purchase-history record (restore path).
    GoogleRestored,
    /// An Amazon Appstore receipt.
    AmazonPurchase,
    /// A Samsung Galaxy Store order.
    GalaxyPurchase,
}

/// Purchase state as the canonical model understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseState {
    Purchased,
    /// Payment has not completed; the purchase must not be finalized.
    Pending,
    Unspecified,
}

impl PurchaseState {
    /// Map the store's raw numeric state. Unknown values are conservative:
    /// they become `Unspecified`, never `Purchased`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            purchase_state_raw::PURCHASED => Self::Purchased,
            purchase_state_raw::PENDING => Self::Pending,
            _ => Self::Unspecified,
        }
    }
}

/// Product classification of a normalized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionProductType {
    Subscription,
    OneTime,
    /// A single purchase covering multiple subscription products.
    SubscriptionBundle,
}

/// Targeting rule that led to the offering being shown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetingContext {
    pub revision: i32,
    pub rule_id: String,
}

/// The offering context a purchase was presented under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresentedOfferingContext {
    pub offering_id: String,
    pub placement_id: Option<String>,
    pub targeting_context: Option<TargetingContext>,
}

/// Canonical, store-agnostic purchase record.
///
/// `purchase_token` is the stable identity key: deduplication and cache
/// lookups key on it. Equality and hashing exclude `raw_payload`, which
/// carries diagnostic value only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreTransaction {
    pub order_id: Option<String>,
    /// Product ids covered by this purchase, in store order; more than one
    /// means a multi-line purchase.
    pub product_ids: Vec<String>,
    pub product_type: TransactionProductType,
    pub purchase_time_millis: i64,
    pub purchase_token: String,
    pub purchase_state: PurchaseState,
    pub is_auto_renewing: Option<bool>,
    pub signature: Option<String>,
    /// The store's raw record, kept verbatim for diagnostics.
    pub raw_payload: serde_json::Value,
    pub presented_offering_context: Option<PresentedOfferingContext>,
    pub store_user_id: Option<String>,
    pub source: SourceStore,
    pub marketplace: Option<String>,
    /// Base plan id, optionally suffixed with the offer id, for
    /// subscription purchases whose option is known.
    pub subscription_option_id: Option<String>,
    /// Store-reported finalization state, not the dedup cache's view.
    pub is_acknowledged_or_consumed: bool,
}

impl PartialEq for StoreTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.order_id == other.order_id
            && self.product_ids == other.product_ids
            && self.product_type == other.product_type
            && self.purchase_time_millis == other.purchase_time_millis
            && self.purchase_token == other.purchase_token
            && self.purchase_state == other.purchase_state
            && self.is_auto_renewing == other.is_auto_renewing
            && self.signature == other.signature
            && self.presented_offering_context == other.presented_offering_context
            && self.store_user_id == other.store_user_id
            && self.source == other.source
            && self.marketplace == other.marketplace
            && self.subscription_option_id == other.subscription_option_id
            && self.is_acknowledged_or_consumed == other.is_acknowledged_or_consumed
    }
}

impl Eq for StoreTransaction {}

impl Hash for StoreTransaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_id.hash(state);
        self.product_ids.hash(state);
        self.product_type.hash(state);
        self.purchase_time_millis.hash(state);
        self.purchase_token.hash(state);
        self.purchase_state.hash(state);
        self.is_auto_renewing.hash(state);
        self.signature.hash(state);
        self.presented_offering_context.hash(state);
        self.store_user_id.hash(state);
        self.source.hash(state);
        self.marketplace.hash(state);
        self.subscription_option_id.hash(state);
        self.is_acknowledged_or_consumed.hash(state);
    }
}
