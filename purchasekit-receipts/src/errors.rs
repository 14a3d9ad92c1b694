//! Error types for the normalization and posting pipeline.

use purchasekit_billing::BillingError;

use crate::transaction::SourceStore;

/// A store record could not be normalized.
///
/// Normalization fails closed: a record missing a required identity field
/// never becomes a partially-populated transaction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NormalizeError {
    #[error("{store:?} record is missing its purchase token")]
    MissingPurchaseToken { store: SourceStore },

    #[error("{store:?} record has no product ids")]
    MissingProductIds { store: SourceStore },
}

/// The backend rejected or failed to accept a posted receipt.
#[derive(Debug, Clone)]
pub struct BackendError {
    /// Backend-assigned error code, when one was returned.
    pub code: Option<i32>,
    pub message: String,
}

impl BackendError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "backend error {}: {}", code, self.message),
            None => write!(f, "backend error: {}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

/// Comprehensive error type for receipt operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReceiptError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Posting to the backend failed; finalization did not happen and the
    /// purchase stays eligible for a future attempt.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A store query failed before the pipeline could run.
    #[error("store call failed: {0}")]
    Billing(#[from] BillingError),

    /// The store refused the consume/acknowledge call. When this follows a
    /// successful backend post, the post is not rolled back; the token
    /// stays un-cached so a later restore pass can retry finalization.
    #[error("finalization failed: {0}")]
    Finalization(BillingError),

    #[error("token cache error: {0}")]
    Cache(String),
}
