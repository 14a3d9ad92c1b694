//! Connection lifecycle state for the store service.
//!
//! The state itself is a plain value; the owning client guards it with a
//! mutex because both application threads and store callback threads drive
//! transitions.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::codes::StoreResponseCode;

/// Lifecycle status of the store service connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Outcome of a failed setup callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupFailure {
    /// Retryable code: reconnect after this delay.
    Retry(Duration),
    /// Terminal code: no retry will ever be scheduled.
    Terminal,
    /// Duplicate delivery for an attempt that already resolved.
    Ignored,
}

/// Tracks the store connection lifecycle and reconnection bookkeeping.
#[derive(Debug)]
pub struct ConnectionState {
    status: ConnectionStatus,
    consecutive_failures: u32,
    last_disconnect: Option<StoreResponseCode>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            consecutive_failures: 0,
            last_disconnect: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_disconnect(&self) -> Option<StoreResponseCode> {
        self.last_disconnect
    }

    /// Attempt to move into `Connecting`.
    ///
    /// Returns false when already connecting or connected, in which case the
    /// caller must not issue another platform connect call.
    pub fn begin_connecting(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Disconnected => {
                self.status = ConnectionStatus::Connecting;
                true
            }
            ConnectionStatus::Connecting | ConnectionStatus::Connected => false,
        }
    }

    /// Record a successful setup callback.
    ///
    /// Returns true only on the transition into `Connected`; duplicate
    /// deliveries of the setup callback return false so the caller notifies
    /// its state listener at most once per connection. This is the only
    /// place the consecutive-failure count resets.
    pub fn record_connected(&mut self) -> bool {
        if self.status == ConnectionStatus::Connected {
            return false;
        }
        self.status = ConnectionStatus::Connected;
        self.consecutive_failures = 0;
        self.last_disconnect = None;
        true
    }

    /// Record a service-initiated disconnect. Never schedules a reconnect
    /// by itself; the next enqueued request triggers one.
    pub fn record_disconnected(&mut self, reason: Option<StoreResponseCode>) {
        self.status = ConnectionStatus::Disconnected;
        self.last_disconnect = reason;
    }

    /// Record a failed setup callback.
    ///
    /// Only acts when an attempt is actually in progress; a callback
    /// arriving after the attempt already resolved (duplicate delivery) is
    /// ignored.
    pub fn record_setup_failure(
        &mut self,
        code: StoreResponseCode,
        policy: &ReconnectPolicy,
    ) -> SetupFailure {
        if self.status != ConnectionStatus::Connecting {
            return SetupFailure::Ignored;
        }
        self.status = ConnectionStatus::Disconnected;
        self.last_disconnect = Some(code);
        if !code.is_retryable_connection() {
            return SetupFailure::Terminal;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        SetupFailure::Retry(policy.delay_for_attempt(self.consecutive_failures))
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_connecting_is_single_shot() {
        let mut state = ConnectionState::new();
        assert!(state.begin_connecting());
        assert!(!state.begin_connecting(), "already connecting");
        assert_eq!(state.status(), ConnectionStatus::Connecting);

        state.record_connected();
        assert!(!state.begin_connecting(), "already connected");
    }

    #[test]
    fn failures_accumulate_and_reset_on_connect() {
        let mut state = ConnectionState::new();
        let policy = ReconnectPolicy::new(1_000, 30_000);

        state.begin_connecting();
        let first = match state.record_setup_failure(StoreResponseCode::ServiceUnavailable, &policy)
        {
            SetupFailure::Retry(delay) => delay,
            other => panic!("expected retry, got {:?}", other),
        };

        state.begin_connecting();
        let second =
            match state.record_setup_failure(StoreResponseCode::ServiceUnavailable, &policy) {
                SetupFailure::Retry(delay) => delay,
                other => panic!("expected retry, got {:?}", other),
            };
        assert!(second > first, "backoff must grow");
        assert_eq!(state.consecutive_failures(), 2);

        state.begin_connecting();
        assert!(state.record_connected());
        assert_eq!(state.consecutive_failures(), 0);

        // After a successful connection the next failure starts over.
        state.record_disconnected(Some(StoreResponseCode::ServiceDisconnected));
        state.begin_connecting();
        let fresh = match state.record_setup_failure(StoreResponseCode::ServiceUnavailable, &policy)
        {
            SetupFailure::Retry(delay) => delay,
            other => panic!("expected retry, got {:?}", other),
        };
        assert_eq!(fresh, first);
    }

    #[test]
    fn terminal_failure_schedules_no_retry() {
        let mut state = ConnectionState::new();
        let policy = ReconnectPolicy::default();

        state.begin_connecting();
        let outcome = state.record_setup_failure(StoreResponseCode::FeatureNotSupported, &policy);
        assert_eq!(outcome, SetupFailure::Terminal);
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn duplicate_setup_callbacks_are_ignored() {
        let mut state = ConnectionState::new();
        let policy = ReconnectPolicy::default();

        state.begin_connecting();
        assert!(matches!(
            state.record_setup_failure(StoreResponseCode::ServiceTimeout, &policy),
            SetupFailure::Retry(_)
        ));
        // Second delivery arrives after the state already left Connecting.
        assert_eq!(
            state.record_setup_failure(StoreResponseCode::ServiceTimeout, &policy),
            SetupFailure::Ignored
        );
        assert_eq!(state.consecutive_failures(), 1);
    }

    #[test]
    fn duplicate_connected_callbacks_notify_once() {
        let mut state = ConnectionState::new();
        state.begin_connecting();
        assert!(state.record_connected());
        assert!(!state.record_connected());
    }
}
