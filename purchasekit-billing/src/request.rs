//! Caller-issued request objects.
//!
//! Requests are explicit owned values placed on the client's queue until the
//! connection is ready, rather than closures capturing response slots. Each
//! carries its own exactly-once callback; once dispatched, ownership moves to
//! the in-flight call and the queue no longer tracks it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dedup::OnceCallback;
use crate::errors::BillingError;
use crate::service::{StoreHistoryRecord, StoreProduct, StorePurchaseRecord};

/// Opaque id correlating a request to its single in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Product classification used when talking to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    Subscription,
    OneTime,
    /// The caller could not resolve the product's type.
    Unknown,
}

/// The two query types the store service itself understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    Subscription,
    OneTime,
}

impl ProductKind {
    /// The store-level query type for this kind.
    ///
    /// The store treats unknown products conservatively as one-time
    /// purchases for query purposes.
    pub fn query_kind(self) -> QueryKind {
        match self {
            Self::Subscription => QueryKind::Subscription,
            Self::OneTime | Self::Unknown => QueryKind::OneTime,
        }
    }
}

/// Parameters for a product-details query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductQuery {
    pub ids: Vec<String>,
    pub kind: ProductKind,
}

/// Opaque handle to the host activity/window required to present the
/// store's purchase UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityHandle(pub u64);

/// Parameters for launching the store purchase flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseParams {
    pub activity: ActivityHandle,
    pub product_id: String,
    pub kind: ProductKind,
    /// Offer token for subscription offers, when one was selected.
    pub offer_token: Option<String>,
}

/// One caller-issued operation awaiting dispatch, paired with its
/// exactly-once callback.
pub enum PendingRequest {
    QueryProducts {
        id: RequestId,
        query: ProductQuery,
        callback: OnceCallback<Vec<StoreProduct>>,
    },
    LaunchPurchase {
        id: RequestId,
        params: PurchaseParams,
        callback: OnceCallback<Vec<StorePurchaseRecord>>,
    },
    QueryPurchases {
        id: RequestId,
        kind: QueryKind,
        callback: OnceCallback<Vec<StorePurchaseRecord>>,
    },
    QueryPurchaseHistory {
        id: RequestId,
        kind: QueryKind,
        callback: OnceCallback<Vec<StoreHistoryRecord>>,
    },
    Consume {
        id: RequestId,
        token: String,
        callback: OnceCallback<()>,
    },
    Acknowledge {
        id: RequestId,
        token: String,
        callback: OnceCallback<()>,
    },
}

impl PendingRequest {
    pub fn id(&self) -> RequestId {
        match self {
            Self::QueryProducts { id, .. }
            | Self::LaunchPurchase { id, .. }
            | Self::QueryPurchases { id, .. }
            | Self::QueryPurchaseHistory { id, .. }
            | Self::Consume { id, .. }
            | Self::Acknowledge { id, .. } => *id,
        }
    }

    /// Short name of the operation, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::QueryProducts { .. } => "query_products",
            Self::LaunchPurchase { .. } => "launch_purchase",
            Self::QueryPurchases { .. } => "query_purchases",
            Self::QueryPurchaseHistory { .. } => "query_purchase_history",
            Self::Consume { .. } => "consume",
            Self::Acknowledge { .. } => "acknowledge",
        }
    }

    /// Deliver a failure to this request's callback, consuming it.
    pub fn fail(self, error: BillingError) {
        match self {
            Self::QueryProducts { callback, .. } => {
                callback.fail(error);
            }
            Self::LaunchPurchase { callback, .. } => {
                callback.fail(error);
            }
            Self::QueryPurchases { callback, .. } => {
                callback.fail(error);
            }
            Self::QueryPurchaseHistory { callback, .. } => {
                callback.fail(error);
            }
            Self::Consume { callback, .. } => {
                callback.fail(error);
            }
            Self::Acknowledge { callback, .. } => {
                callback.fail(error);
            }
        }
    }
}

// The boxed continuations are opaque, so Debug is limited to the operation
// shape.
impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id())
            .field("kind", &self.kind_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_queries_as_one_time() {
        assert_eq!(ProductKind::Unknown.query_kind(), QueryKind::OneTime);
        assert_eq!(ProductKind::OneTime.query_kind(), QueryKind::OneTime);
        assert_eq!(
            ProductKind::Subscription.query_kind(),
            QueryKind::Subscription
        );
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
