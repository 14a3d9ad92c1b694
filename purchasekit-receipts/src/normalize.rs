//! Per-store normalization into the canonical transaction model.
//!
//! All constructors are pure and fail closed: a record missing its purchase
//! token or product ids is rejected outright rather than defaulted, because
//! those fields are the identity the rest of the pipeline keys on.

use purchasekit_billing::{ProductKind, StoreHistoryRecord, StorePurchaseRecord};

use crate::errors::NormalizeError;
use crate::records::{AmazonReceiptRecord, GalaxyOrderRecord};
use crate::transaction::{
    PresentedOfferingContext, PurchaseState, SourceStore, StoreTransaction, TransactionProductType,
};

/// Normalize a live Google Play purchase.
pub fn from_google_purchase(
    record: &StorePurchaseRecord,
    kind: ProductKind,
    offering: Option<PresentedOfferingContext>,
) -> Result<StoreTransaction, NormalizeError> {
    let store = SourceStore::GooglePurchase;
    require_token(&record.purchase_token, store)?;
    require_products(&record.product_ids, store)?;

    let product_type = product_type_for(kind, record.product_ids.len());
    Ok(StoreTransaction {
        order_id: record.order_id.clone(),
        product_ids: record.product_ids.clone(),
        product_type,
        purchase_time_millis: record.purchase_time_millis,
        purchase_token: record.purchase_token.clone(),
        purchase_state: PurchaseState::from_raw(record.purchase_state_raw),
        is_auto_renewing: record.is_auto_renewing,
        signature: record.signature.clone(),
        raw_payload: record.raw_json.clone(),
        presented_offering_context: offering,
        store_user_id: None,
        source: store,
        marketplace: None,
        subscription_option_id: subscription_option_id(product_type, record),
        is_acknowledged_or_consumed: record.is_acknowledged,
    })
}

/// Normalize a Google Play purchase-history record (restore path).
///
/// History records report neither the renewal flag nor the purchased
/// option, so both normalize to absent rather than guessed values.
pub fn from_google_history(
    record: &StoreHistoryRecord,
    kind: ProductKind,
    offering: Option<PresentedOfferingContext>,
) -> Result<StoreTransaction, NormalizeError> {
    let store = SourceStore::GoogleRestored;
    require_token(&record.purchase_token, store)?;
    require_products(&record.product_ids, store)?;

    Ok(StoreTransaction {
        order_id: None,
        product_ids: record.product_ids.clone(),
        product_type: product_type_for(kind, record.product_ids.len()),
        purchase_time_millis: record.purchase_time_millis,
        purchase_token: record.purchase_token.clone(),
        purchase_state: PurchaseState::Unspecified,
        is_auto_renewing: None,
        signature: record.signature.clone(),
        raw_payload: record.raw_json.clone(),
        presented_offering_context: offering,
        store_user_id: None,
        source: store,
        marketplace: None,
        subscription_option_id: None,
        is_acknowledged_or_consumed: false,
    })
}

/// Normalize an Amazon Appstore receipt. The receipt id becomes the
/// purchase token; price and currency are not derivable from the receipt
/// and stay with the caller-supplied product metadata.
pub fn from_amazon_receipt(
    record: &AmazonReceiptRecord,
    offering: Option<PresentedOfferingContext>,
) -> Result<StoreTransaction, NormalizeError> {
    let store = SourceStore::AmazonPurchase;
    require_token(&record.receipt_id, store)?;
    require_products(std::slice::from_ref(&record.product_id), store)?;

    Ok(StoreTransaction {
        order_id: None,
        product_ids: vec![record.product_id.clone()],
        product_type: product_type_for(record.product_kind, 1),
        purchase_time_millis: record.purchase_time_millis,
        purchase_token: record.receipt_id.clone(),
        purchase_state: PurchaseState::Purchased,
        is_auto_renewing: record.is_auto_renewing,
        signature: record.signature.clone(),
        raw_payload: record.raw_json.clone(),
        presented_offering_context: offering,
        store_user_id: Some(record.user_id.clone()),
        source: store,
        marketplace: record.marketplace.clone(),
        subscription_option_id: None,
        is_acknowledged_or_consumed: false,
    })
}

/// Normalize a Samsung Galaxy Store order.
pub fn from_galaxy_order(
    record: &GalaxyOrderRecord,
    offering: Option<PresentedOfferingContext>,
) -> Result<StoreTransaction, NormalizeError> {
    let store = SourceStore::GalaxyPurchase;
    require_token(&record.purchase_id, store)?;
    require_products(std::slice::from_ref(&record.product_id), store)?;

    Ok(StoreTransaction {
        order_id: record.order_id.clone(),
        product_ids: vec![record.product_id.clone()],
        product_type: product_type_for(record.product_kind, 1),
        purchase_time_millis: record.purchase_time_millis,
        purchase_token: record.purchase_id.clone(),
        purchase_state: PurchaseState::Purchased,
        is_auto_renewing: record.is_auto_renewing,
        signature: None,
        raw_payload: record.raw_json.clone(),
        presented_offering_context: offering,
        store_user_id: record.user_id.clone(),
        source: store,
        marketplace: None,
        subscription_option_id: None,
        is_acknowledged_or_consumed: false,
    })
}

fn product_type_for(kind: ProductKind, line_count: usize) -> TransactionProductType {
    match kind {
        ProductKind::Subscription if line_count > 1 => TransactionProductType::SubscriptionBundle,
        ProductKind::Subscription => TransactionProductType::Subscription,
        ProductKind::OneTime | ProductKind::Unknown => TransactionProductType::OneTime,
    }
}

/// `base_plan_id`, suffixed with `:offer_id` when an offer applied. Only
/// meaningful for subscriptions; one-time products have no options.
fn subscription_option_id(
    product_type: TransactionProductType,
    record: &StorePurchaseRecord,
) -> Option<String> {
    if product_type == TransactionProductType::OneTime {
        return None;
    }
    let base_plan = record.base_plan_id.as_ref()?;
    Some(match &record.offer_id {
        Some(offer) => format!("{base_plan}:{offer}"),
        None => base_plan.clone(),
    })
}

fn require_token(token: &str, store: SourceStore) -> Result<(), NormalizeError> {
    if token.is_empty() {
        return Err(NormalizeError::MissingPurchaseToken { store });
    }
    Ok(())
}

fn require_products(product_ids: &[String], store: SourceStore) -> Result<(), NormalizeError> {
    if product_ids.is_empty() || product_ids.iter().all(String::is_empty) {
        return Err(NormalizeError::MissingProductIds { store });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn google_record() -> StorePurchaseRecord {
        StorePurchaseRecord {
            order_id: Some("GPA.5555".into()),
            product_ids: vec!["premium_yearly".into()],
            purchase_time_millis: 1_700_000_000_000,
            purchase_token: "g-token".into(),
            purchase_state_raw: 1,
            is_auto_renewing: Some(true),
            is_acknowledged: false,
            signature: Some("sig".into()),
            base_plan_id: Some("yearly".into()),
            offer_id: None,
            raw_json: json!({"orderId": "GPA.5555"}),
        }
    }

    #[test]
    fn google_purchase_maps_fields() {
        let txn = from_google_purchase(&google_record(), ProductKind::Subscription, None).unwrap();
        assert_eq!(txn.source, SourceStore::GooglePurchase);
        assert_eq!(txn.purchase_token, "g-token");
        assert_eq!(txn.purchase_state, PurchaseState::Purchased);
        assert_eq!(txn.product_type, TransactionProductType::Subscription);
        assert_eq!(txn.subscription_option_id.as_deref(), Some("yearly"));
        assert_eq!(txn.is_auto_renewing, Some(true));
        assert!(!txn.is_acknowledged_or_consumed);
    }

    #[test]
    fn google_offer_id_joins_the_option_id() {
        let mut record = google_record();
        record.offer_id = Some("intro".into());
        let txn = from_google_purchase(&record, ProductKind::Subscription, None).unwrap();
        assert_eq!(txn.subscription_option_id.as_deref(), Some("yearly:intro"));
    }

    #[test]
    fn one_time_products_have_no_option_id() {
        let mut record = google_record();
        record.base_plan_id = Some("should-be-ignored".into());
        let txn = from_google_purchase(&record, ProductKind::OneTime, None).unwrap();
        assert_eq!(txn.product_type, TransactionProductType::OneTime);
        assert_eq!(txn.subscription_option_id, None);
    }

    #[test]
    fn multi_line_subscription_becomes_bundle() {
        let mut record = google_record();
        record.product_ids = vec!["premium_yearly".into(), "addon_storage".into()];
        let txn = from_google_purchase(&record, ProductKind::Subscription, None).unwrap();
        assert_eq!(txn.product_type, TransactionProductType::SubscriptionBundle);
        assert_eq!(txn.product_ids.len(), 2);
    }

    #[test]
    fn pending_state_survives_normalization() {
        let mut record = google_record();
        record.purchase_state_raw = 2;
        let txn = from_google_purchase(&record, ProductKind::Subscription, None).unwrap();
        assert_eq!(txn.purchase_state, PurchaseState::Pending);
    }

    #[test]
    fn missing_token_fails_closed() {
        let mut record = google_record();
        record.purchase_token = String::new();
        let err = from_google_purchase(&record, ProductKind::Subscription, None).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingPurchaseToken { .. }));
    }

    #[test]
    fn missing_products_fail_closed() {
        let mut record = google_record();
        record.product_ids = Vec::new();
        let err = from_google_purchase(&record, ProductKind::Subscription, None).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingProductIds { .. }));

        let mut record = google_record();
        record.product_ids = vec![String::new()];
        let err = from_google_purchase(&record, ProductKind::Subscription, None).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingProductIds { .. }));
    }

    #[test]
    fn history_record_drops_unreportable_fields() {
        let record = StoreHistoryRecord {
            product_ids: vec!["premium_yearly".into()],
            purchase_time_millis: 1_600_000_000_000,
            purchase_token: "h-token".into(),
            signature: None,
            raw_json: json!({}),
        };
        let txn = from_google_history(&record, ProductKind::Subscription, None).unwrap();
        assert_eq!(txn.source, SourceStore::GoogleRestored);
        assert_eq!(txn.is_auto_renewing, None);
        assert_eq!(txn.subscription_option_id, None);
        assert_eq!(txn.order_id, None);
        assert_eq!(txn.purchase_state, PurchaseState::Unspecified);
    }

    #[test]
    fn amazon_receipt_maps_user_and_marketplace() {
        let record = AmazonReceiptRecord {
            receipt_id: "amzn-receipt-1".into(),
            user_id: "amzn-user".into(),
            product_id: "coins_500".into(),
            product_kind: ProductKind::OneTime,
            purchase_time_millis: 1_650_000_000_000,
            is_auto_renewing: None,
            signature: None,
            marketplace: Some("US".into()),
            raw_json: json!({"receiptId": "amzn-receipt-1"}),
        };
        let txn = from_amazon_receipt(&record, None).unwrap();
        assert_eq!(txn.source, SourceStore::AmazonPurchase);
        assert_eq!(txn.purchase_token, "amzn-receipt-1");
        assert_eq!(txn.store_user_id.as_deref(), Some("amzn-user"));
        assert_eq!(txn.marketplace.as_deref(), Some("US"));
        assert_eq!(txn.purchase_state, PurchaseState::Purchased);
    }

    #[test]
    fn amazon_receipt_without_id_fails_closed() {
        let record = AmazonReceiptRecord {
            receipt_id: String::new(),
            user_id: "amzn-user".into(),
            product_id: "coins_500".into(),
            product_kind: ProductKind::OneTime,
            purchase_time_millis: 0,
            is_auto_renewing: None,
            signature: None,
            marketplace: None,
            raw_json: json!({}),
        };
        assert!(from_amazon_receipt(&record, None).is_err());
    }

    #[test]
    fn galaxy_order_maps_fields() {
        let record = GalaxyOrderRecord {
            order_id: Some("S2024-001".into()),
            purchase_id: "galaxy-p-1".into(),
            product_id: "premium_monthly".into(),
            product_kind: ProductKind::Subscription,
            purchase_time_millis: 1_680_000_000_000,
            is_auto_renewing: Some(false),
            user_id: Some("galaxy-user".into()),
            raw_json: json!({}),
        };
        let txn = from_galaxy_order(&record, None).unwrap();
        assert_eq!(txn.source, SourceStore::GalaxyPurchase);
        assert_eq!(txn.purchase_token, "galaxy-p-1");
        assert_eq!(txn.product_type, TransactionProductType::Subscription);
        assert_eq!(txn.store_user_id.as_deref(), Some("galaxy-user"));
    }

    #[test]
    fn unknown_kind_normalizes_as_one_time() {
        let txn = from_google_purchase(&google_record(), ProductKind::Unknown, None).unwrap();
        assert_eq!(txn.product_type, TransactionProductType::OneTime);
    }
}
