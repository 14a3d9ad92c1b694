//! Receipt posting sequenced with store finalization.
//!
//! Ordering is the contract here: post to the backend first, finalize on
//! the store only after the backend accepted. A purchase whose post failed
//! must stay consumable/acknowledgeable for a future attempt, while an
//! already-handled token short-circuits before any network traffic.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{hash_token, PostedTokenCache};
use crate::consume::{ConsumeOutcome, ConsumptionCoordinator};
use crate::errors::{BackendError, ReceiptError};
use crate::transaction::StoreTransaction;

/// What kicked off this post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiationSource {
    Purchase,
    Restore,
}

/// Price/currency resolved from a store product lookup.
///
/// A zero price is not distinguishable from "unknown" in this domain, so
/// the constructor normalizes zero (and negative) prices to absent, taking
/// the currency with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub product_id: String,
    pub price_micros: Option<i64>,
    pub currency: Option<String>,
}

impl ProductMetadata {
    pub fn new(
        product_id: impl Into<String>,
        price_micros: Option<i64>,
        currency: Option<String>,
    ) -> Self {
        match price_micros {
            Some(price) if price > 0 => Self {
                product_id: product_id.into(),
                price_micros: Some(price),
                currency,
            },
            _ => Self {
                product_id: product_id.into(),
                price_micros: None,
                currency: None,
            },
        }
    }
}

/// Backend receipt endpoint (external collaborator).
#[async_trait]
pub trait ReceiptPoster: Send + Sync {
    async fn post_receipt(
        &self,
        transaction: &StoreTransaction,
        metadata: Option<&ProductMetadata>,
        is_restore: bool,
        source: InitiationSource,
    ) -> Result<(), BackendError>;
}

/// How a pipeline run resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// The token was already in the cache; neither posting nor
    /// finalization ran.
    AlreadyPosted,
    /// The backend accepted the receipt and finalization resolved as given.
    Posted(ConsumeOutcome),
}

/// Drives one transaction through cache check, backend post, and store
/// finalization, in that order.
pub struct PostReceiptPipeline {
    poster: Arc<dyn ReceiptPoster>,
    cache: Arc<dyn PostedTokenCache>,
    coordinator: Arc<ConsumptionCoordinator>,
}

impl PostReceiptPipeline {
    pub fn new(
        poster: Arc<dyn ReceiptPoster>,
        cache: Arc<dyn PostedTokenCache>,
        coordinator: Arc<ConsumptionCoordinator>,
    ) -> Self {
        Self {
            poster,
            cache,
            coordinator,
        }
    }

    /// Post `transaction` to the backend and finalize it on the store.
    ///
    /// Backend failures surface as [`ReceiptError::Backend`] and leave the
    /// purchase fully retryable. A finalization failure after a successful
    /// post surfaces as [`ReceiptError::Finalization`]; the post is not
    /// rolled back, and the un-cached token lets a later pass finish the
    /// job.
    pub async fn post_and_finalize(
        &self,
        transaction: &StoreTransaction,
        metadata: Option<&ProductMetadata>,
        should_consume: bool,
        is_restore: bool,
        source: InitiationSource,
    ) -> Result<PostOutcome, ReceiptError> {
        let hashed = hash_token(&transaction.purchase_token);
        if self.cache.has_token(&hashed).await? {
            debug!(token = %transaction.purchase_token, "receipt already handled, skipping");
            return Ok(PostOutcome::AlreadyPosted);
        }

        self.poster
            .post_receipt(transaction, metadata, is_restore, source)
            .await
            .map_err(|error| {
                warn!(token = %transaction.purchase_token, %error, "backend rejected receipt");
                ReceiptError::Backend(error)
            })?;

        let outcome = self
            .coordinator
            .consume_and_save(should_consume, transaction)
            .await?;
        Ok(PostOutcome::Posted(outcome))
    }
}
