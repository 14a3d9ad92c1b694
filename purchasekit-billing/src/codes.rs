//! Result-code taxonomy of the native billing service.
//!
//! The platform reports every connection and request outcome through a fixed
//! enumerated set of codes. This module owns that taxonomy and the
//! classification of which codes warrant a reconnection attempt.

use serde::{Deserialize, Serialize};

/// Result code reported by the native billing service.
///
/// Values mirror the platform's integer constants so that adapters can
/// round-trip raw codes across the FFI boundary without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreResponseCode {
    /// Operation completed successfully.
    Ok,
    /// The user dismissed or canceled the flow.
    UserCanceled,
    /// The store service is temporarily unavailable.
    ServiceUnavailable,
    /// Billing is not available on this device or account.
    BillingUnavailable,
    /// The requested product is not available for purchase.
    ItemUnavailable,
    /// The request was malformed (bad arguments, wrong signature, ...).
    DeveloperError,
    /// Generic store failure with no further classification.
    Error,
    /// The item is already owned by this account.
    ItemAlreadyOwned,
    /// The item is not owned, so it cannot be consumed or acknowledged.
    ItemNotOwned,
    /// The connection to the store service was severed.
    ServiceDisconnected,
    /// The store service did not respond in time.
    ServiceTimeout,
    /// The requested feature is not supported by the installed store.
    FeatureNotSupported,
    /// A transient network failure occurred while reaching the store.
    NetworkError,
}

impl StoreResponseCode {
    /// Parse the platform's raw integer constant.
    pub fn from_raw(raw: i32) -> Option<Self> {
        let code = match raw {
            -3 => Self::ServiceTimeout,
            -2 => Self::FeatureNotSupported,
            -1 => Self::ServiceDisconnected,
            0 => Self::Ok,
            1 => Self::UserCanceled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            6 => Self::Error,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            12 => Self::NetworkError,
            _ => return None,
        };
        Some(code)
    }

    /// The platform's raw integer constant for this code.
    pub fn raw(self) -> i32 {
        match self {
            Self::ServiceTimeout => -3,
            Self::FeatureNotSupported => -2,
            Self::ServiceDisconnected => -1,
            Self::Ok => 0,
            Self::UserCanceled => 1,
            Self::ServiceUnavailable => 2,
            Self::BillingUnavailable => 3,
            Self::ItemUnavailable => 4,
            Self::DeveloperError => 5,
            Self::Error => 6,
            Self::ItemAlreadyOwned => 7,
            Self::ItemNotOwned => 8,
            Self::NetworkError => 12,
        }
    }

    /// Whether a failed connection setup with this code should be retried
    /// with backoff.
    ///
    /// Everything outside this set is terminal for connection purposes: the
    /// store either cannot support billing at all or the failure is a caller
    /// bug, and retrying would only repeat it.
    pub fn is_retryable_connection(self) -> bool {
        matches!(
            self,
            Self::ServiceTimeout
                | Self::Error
                | Self::ServiceUnavailable
                | Self::UserCanceled
                | Self::ServiceDisconnected
                | Self::NetworkError
        )
    }

    /// Short human-readable description used in error messages.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::UserCanceled => "canceled by user",
            Self::ServiceUnavailable => "store service unavailable",
            Self::BillingUnavailable => "billing unavailable on this device",
            Self::ItemUnavailable => "item unavailable",
            Self::DeveloperError => "developer error",
            Self::Error => "store error",
            Self::ItemAlreadyOwned => "item already owned",
            Self::ItemNotOwned => "item not owned",
            Self::ServiceDisconnected => "store service disconnected",
            Self::ServiceTimeout => "store service timed out",
            Self::FeatureNotSupported => "feature not supported",
            Self::NetworkError => "network error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip() {
        for raw in [-3, -2, -1, 0, 1, 2, 3, 4, 5, 6, 7, 8, 12] {
            let code = StoreResponseCode::from_raw(raw).expect("known raw code");
            assert_eq!(code.raw(), raw);
        }
    }

    #[test]
    fn unknown_raw_code_is_rejected() {
        assert_eq!(StoreResponseCode::from_raw(99), None);
        assert_eq!(StoreResponseCode::from_raw(9), None);
    }

    #[test]
    fn terminal_codes_are_not_retryable() {
        for code in [
            StoreResponseCode::FeatureNotSupported,
            StoreResponseCode::BillingUnavailable,
            StoreResponseCode::ItemUnavailable,
            StoreResponseCode::ItemAlreadyOwned,
            StoreResponseCode::ItemNotOwned,
            StoreResponseCode::DeveloperError,
            StoreResponseCode::Ok,
        ] {
            assert!(!code.is_retryable_connection(), "{:?}", code);
        }
    }

    #[test]
    fn transient_codes_are_retryable() {
        for code in [
            StoreResponseCode::ServiceTimeout,
            StoreResponseCode::Error,
            StoreResponseCode::ServiceUnavailable,
            StoreResponseCode::UserCanceled,
            StoreResponseCode::ServiceDisconnected,
            StoreResponseCode::NetworkError,
        ] {
            assert!(code.is_retryable_connection(), "{:?}", code);
        }
    }
}
