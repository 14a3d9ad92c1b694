//! Idempotent purchase finalization.
//!
//! Given a normalized transaction and a should-consume policy, decides
//! whether to consume (consumable one-time products) or acknowledge
//! (subscriptions and bundles), performs the store call, and on success
//! records the token in the posted-token cache so the purchase is never
//! processed again.

use std::sync::Arc;

use async_trait::async_trait;
use purchasekit_billing::BillingClient;
use tracing::debug;

use crate::cache::{hash_token, PostedTokenCache};
use crate::errors::ReceiptError;
use crate::transaction::{PurchaseState, StoreTransaction, TransactionProductType};

/// The store-side finalization calls the coordinator needs.
#[async_trait]
pub trait PurchaseFinalizer: Send + Sync {
    async fn consume(&self, purchase_token: &str) -> purchasekit_billing::Result<()>;
    async fn acknowledge(&self, purchase_token: &str) -> purchasekit_billing::Result<()>;
}

#[async_trait]
impl PurchaseFinalizer for BillingClient {
    async fn consume(&self, purchase_token: &str) -> purchasekit_billing::Result<()> {
        self.consume_async(purchase_token.to_owned()).await
    }

    async fn acknowledge(&self, purchase_token: &str) -> purchasekit_billing::Result<()> {
        self.acknowledge_async(purchase_token.to_owned()).await
    }
}

/// How a `consume_and_save` call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The purchase is still pending payment; nothing was finalized and
    /// nothing was cached.
    PendingUntouched,
    /// Policy said not to finalize on the store (observer-mode hosts); the
    /// token was cached as handled.
    CachedWithoutFinalizing,
    /// The store already reported the purchase finalized; only the cache
    /// entry was added.
    AlreadyFinalized,
    /// The store consumed the purchase and the token was cached.
    Consumed,
    /// The store acknowledged the purchase and the token was cached.
    Acknowledged,
}

/// Drives the acknowledge/consume decision for one transaction at a time.
pub struct ConsumptionCoordinator {
    finalizer: Arc<dyn PurchaseFinalizer>,
    cache: Arc<dyn PostedTokenCache>,
}

impl ConsumptionCoordinator {
    pub fn new(finalizer: Arc<dyn PurchaseFinalizer>, cache: Arc<dyn PostedTokenCache>) -> Self {
        Self { finalizer, cache }
    }

    /// Finalize `transaction` according to `should_consume` and record its
    /// token once finalization succeeded or was intentionally skipped.
    ///
    /// The cache write happens if and only if the store call succeeded or
    /// was policy-skipped; a store failure leaves the token un-cached so a
    /// later restore pass can retry.
    pub async fn consume_and_save(
        &self,
        should_consume: bool,
        transaction: &StoreTransaction,
    ) -> Result<ConsumeOutcome, ReceiptError> {
        if transaction.purchase_state == PurchaseState::Pending {
            debug!(
                token = %transaction.purchase_token,
                "purchase still pending, leaving it untouched"
            );
            return Ok(ConsumeOutcome::PendingUntouched);
        }

        if !should_consume {
            self.record(&transaction.purchase_token).await?;
            debug!(
                token = %transaction.purchase_token,
                "policy skipped store finalization, token cached"
            );
            return Ok(ConsumeOutcome::CachedWithoutFinalizing);
        }

        if transaction.is_acknowledged_or_consumed {
            self.record(&transaction.purchase_token).await?;
            return Ok(ConsumeOutcome::AlreadyFinalized);
        }

        let outcome = match transaction.product_type {
            TransactionProductType::OneTime => {
                self.finalizer
                    .consume(&transaction.purchase_token)
                    .await
                    .map_err(ReceiptError::Finalization)?;
                ConsumeOutcome::Consumed
            }
            TransactionProductType::Subscription | TransactionProductType::SubscriptionBundle => {
                self.finalizer
                    .acknowledge(&transaction.purchase_token)
                    .await
                    .map_err(ReceiptError::Finalization)?;
                ConsumeOutcome::Acknowledged
            }
        };

        self.record(&transaction.purchase_token).await?;
        debug!(token = %transaction.purchase_token, ?outcome, "purchase finalized");
        Ok(outcome)
    }

    async fn record(&self, purchase_token: &str) -> Result<(), ReceiptError> {
        self.cache.add_token(&hash_token(purchase_token)).await
    }
}
