//! Purchase sync: the restore/recovery sweep.
//!
//! Re-queries the purchases the store says this user owns and drives each
//! through the posting pipeline. Tokens already handled short-circuit at
//! the cache, so running the sweep repeatedly is safe; purchases whose
//! finalization failed earlier get their retry here.

use std::sync::Arc;

use async_trait::async_trait;
use purchasekit_billing::{BillingClient, ProductKind, StorePurchaseRecord};
use tracing::{debug, warn};

use crate::errors::ReceiptError;
use crate::normalize;
use crate::pipeline::{InitiationSource, PostOutcome, PostReceiptPipeline};

/// The owned-purchase query the syncer needs from the billing engine.
#[async_trait]
pub trait PurchaseQuerier: Send + Sync {
    async fn owned_purchases(
        &self,
        kind: ProductKind,
    ) -> purchasekit_billing::Result<Vec<StorePurchaseRecord>>;
}

#[async_trait]
impl PurchaseQuerier for BillingClient {
    async fn owned_purchases(
        &self,
        kind: ProductKind,
    ) -> purchasekit_billing::Result<Vec<StorePurchaseRecord>> {
        self.query_purchases_async(kind).await
    }
}

/// Per-purchase result of a sync pass.
#[derive(Debug)]
pub struct SyncedPurchase {
    pub purchase_token: String,
    pub outcome: Result<PostOutcome, ReceiptError>,
}

/// Sweeps owned purchases through the posting pipeline.
pub struct PurchaseSyncer {
    querier: Arc<dyn PurchaseQuerier>,
    pipeline: Arc<PostReceiptPipeline>,
}

impl PurchaseSyncer {
    pub fn new(querier: Arc<dyn PurchaseQuerier>, pipeline: Arc<PostReceiptPipeline>) -> Self {
        Self { querier, pipeline }
    }

    /// Query both product kinds and run every owned purchase through the
    /// pipeline, one at a time.
    ///
    /// A failure on one purchase never cancels the rest; each entry in the
    /// returned list carries its own outcome. The whole pass fails only
    /// when the store query itself does.
    pub async fn sync_purchases(
        &self,
        should_consume: bool,
    ) -> Result<Vec<SyncedPurchase>, ReceiptError> {
        let mut results = Vec::new();

        for kind in [ProductKind::Subscription, ProductKind::OneTime] {
            let records = self.querier.owned_purchases(kind).await?;
            debug!(?kind, count = records.len(), "syncing owned purchases");

            for record in records {
                let token = record.purchase_token.clone();
                let outcome = self.sync_one(&record, kind, should_consume).await;
                if let Err(error) = &outcome {
                    warn!(token = %token, %error, "purchase sync entry failed");
                }
                results.push(SyncedPurchase {
                    purchase_token: token,
                    outcome,
                });
            }
        }

        Ok(results)
    }

    async fn sync_one(
        &self,
        record: &StorePurchaseRecord,
        kind: ProductKind,
        should_consume: bool,
    ) -> Result<PostOutcome, ReceiptError> {
        let transaction = normalize::from_google_purchase(record, kind, None)?;
        self.pipeline
            .post_and_finalize(
                &transaction,
                None,
                should_consume,
                true,
                InitiationSource::Restore,
            )
            .await
    }
}
