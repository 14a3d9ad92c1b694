//! Purchase normalization and receipt posting pipeline.
//!
//! Converts heterogeneous store purchase records (Google Play, Amazon
//! Appstore, Samsung Galaxy Store) into one canonical transaction model and
//! finalizes each purchase exactly once:
//!
//! - [`normalize`]: pure, fail-closed constructors from store records into
//!   [`StoreTransaction`].
//! - [`ConsumptionCoordinator`]: decides consume vs acknowledge, performs
//!   the store call, and records the token in the posted-token cache only
//!   on success or intentional policy skip.
//! - [`PostReceiptPipeline`]: cache-gated post-then-finalize sequencing;
//!   a backend failure blocks finalization, a finalization failure never
//!   rolls back the post.
//! - [`PurchaseSyncer`]: the restore sweep that re-queries owned purchases
//!   and retries anything not yet fully handled.
//!
//! Store connectivity comes from `purchasekit-billing`; the backend poster
//! and the token cache are injected collaborators.

pub mod cache;
pub mod consume;
pub mod errors;
pub mod normalize;
pub mod pipeline;
pub mod records;
pub mod sync;
pub mod transaction;

pub use cache::{hash_token, FileTokenCache, MemoryTokenCache, PostedTokenCache};
pub use consume::{ConsumeOutcome, ConsumptionCoordinator, PurchaseFinalizer};
pub use errors::{BackendError, NormalizeError, ReceiptError};
pub use normalize::{
    from_amazon_receipt, from_galaxy_order, from_google_history, from_google_purchase,
};
pub use pipeline::{
    InitiationSource, PostOutcome, PostReceiptPipeline, ProductMetadata, ReceiptPoster,
};
pub use records::{AmazonReceiptRecord, GalaxyOrderRecord};
pub use sync::{PurchaseQuerier, PurchaseSyncer, SyncedPurchase};
pub use transaction::{
    PresentedOfferingContext, PurchaseState, SourceStore, StoreTransaction, TargetingContext,
    TransactionProductType,
};

/// Common result alias for receipt operations.
pub type Result<T> = std::result::Result<T, ReceiptError>;
