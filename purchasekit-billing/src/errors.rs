//! Error types for billing operations.
//!
//! Every failure is delivered to callers through their `on_error` callback
//! (or as an `Err` from the async wrappers); nothing in this crate panics
//! across the API boundary.

use crate::codes::StoreResponseCode;

/// Stable error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BillingErrorCode {
    /// Connection setup with the store service failed terminally
    SetupFailed = 1000,
    /// A dispatched store call returned a non-success code
    Store = 2000,
    /// The user canceled the flow
    UserCanceled = 3000,
    /// The owning client was closed
    ClientClosed = 4000,
    /// The response channel was torn down before a completion arrived
    ResponseDropped = 5000,
}

/// Comprehensive error type for billing operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BillingError {
    /// Connection setup failed with a terminal code; no retry is scheduled.
    #[error("billing setup failed: {}", .code.description())]
    SetupFailed {
        /// The terminal code the store reported.
        code: StoreResponseCode,
    },

    /// A dispatched store call completed with a non-success code.
    #[error("{context} failed: {}", .code.description())]
    Store {
        /// The store's result code.
        code: StoreResponseCode,
        /// The operation that failed, for diagnostics.
        context: &'static str,
    },

    /// The user canceled the flow. Distinct from infrastructure failures
    /// and never retried automatically.
    #[error("canceled by user")]
    UserCanceled,

    /// The owning client was closed before the request could complete.
    #[error("billing client is closed")]
    ClientClosed,

    /// The response channel was dropped before any completion fired.
    /// Async wrappers report this when the client is closed with the
    /// request still queued.
    #[error("response channel dropped before completion")]
    ResponseDropped,
}

impl BillingError {
    /// Map a store result code from a dispatched call into an error.
    ///
    /// User cancellation gets its own variant so hosts can distinguish it
    /// from infrastructure failures.
    pub fn from_store_code(code: StoreResponseCode, context: &'static str) -> Self {
        match code {
            StoreResponseCode::UserCanceled => Self::UserCanceled,
            other => Self::Store {
                code: other,
                context,
            },
        }
    }

    /// Stable code for FFI/mobile integration.
    pub fn code(&self) -> BillingErrorCode {
        match self {
            Self::SetupFailed { .. } => BillingErrorCode::SetupFailed,
            Self::Store { .. } => BillingErrorCode::Store,
            Self::UserCanceled => BillingErrorCode::UserCanceled,
            Self::ClientClosed => BillingErrorCode::ClientClosed,
            Self::ResponseDropped => BillingErrorCode::ResponseDropped,
        }
    }

    /// The error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// The underlying store result code, when one exists.
    pub fn store_code(&self) -> Option<StoreResponseCode> {
        match self {
            Self::SetupFailed { code } | Self::Store { code, .. } => Some(*code),
            Self::UserCanceled => Some(StoreResponseCode::UserCanceled),
            _ => None,
        }
    }

    /// True if a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { code, .. } => code.is_retryable_connection(),
            Self::UserCanceled | Self::SetupFailed { .. } | Self::ClientClosed => false,
            Self::ResponseDropped => false,
        }
    }
}
