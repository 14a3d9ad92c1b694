//! Store-specific purchase records from stores without a native billing
//! connection in this engine.
//!
//! Google records arrive through the billing crate's store service
//! ([`purchasekit_billing::StorePurchaseRecord`],
//! [`purchasekit_billing::StoreHistoryRecord`]); Amazon and Galaxy adapters
//! hand their receipt shapes to the normalizer directly.

use purchasekit_billing::ProductKind;
use serde::{Deserialize, Serialize};

/// A purchase receipt as reported by the Amazon Appstore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmazonReceiptRecord {
    /// Receipt id; doubles as the purchase token in the canonical model.
    pub receipt_id: String,
    /// Amazon's per-app user id.
    pub user_id: String,
    pub product_id: String,
    pub product_kind: ProductKind,
    pub purchase_time_millis: i64,
    pub is_auto_renewing: Option<bool>,
    pub signature: Option<String>,
    /// Marketplace the purchase was made in (e.g. "US"), when reported.
    pub marketplace: Option<String>,
    pub raw_json: serde_json::Value,
}

/// An order as reported by the Samsung Galaxy Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyOrderRecord {
    pub order_id: Option<String>,
    /// Purchase id; doubles as the purchase token in the canonical model.
    pub purchase_id: String,
    pub product_id: String,
    pub product_kind: ProductKind,
    pub purchase_time_millis: i64,
    pub is_auto_renewing: Option<bool>,
    pub user_id: Option<String>,
    pub raw_json: serde_json::Value,
}
