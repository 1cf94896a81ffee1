// crates/flowctl-core/src/interfaces.rs
// ============================================================================
// Module: Flowctl External Interfaces
// Description: Trait contracts for the collaborators flowctl's core logic
//   depends on but does not implement: persistence, switch transport, and
//   switch connection events.
// Purpose: Let `flowctl-monitor` drive reconciliation against any store or
//   transport implementation, and let tests substitute fakes for both.
// Dependencies: none beyond flowctl-core's own model
// ============================================================================

//! ## Overview
//! Three traits bound the system's external I/O:
//! - [`RuleStore`]: durable desired-state snapshots and the audit log.
//! - [`SwitchTransport`]: sending FLOW_MOD messages to a connected switch.
//! - [`SwitchEventSource`]: a stream of switch connect/feature events.
//!
//! Each trait is paired with a `thiserror` error enum describing exactly
//! what can go wrong at that seam, following the same pattern used
//! throughout this workspace's interface layer.

use std::future::Future;

use crate::identifiers::DatapathId;
use crate::model::AuditEvent;
use crate::model::DesiredState;

// ============================================================================
// SECTION: RuleStore
// ============================================================================

/// Error returned by a [`RuleStore`] operation.
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    /// The underlying storage backend reported a failure.
    #[error("store backend error: {0}")]
    Backend(String),
    /// A row could not be decoded into a domain type.
    #[error("decode error: {0}")]
    Decode(#[from] crate::codec::DecodeError),
}

/// Durable access to desired rule state and the audit trail.
///
/// # Errors
///
/// Every method returns [`RuleStoreError`] on backend failure. Methods do
/// not retry internally; callers decide retry/backoff policy.
///
/// # Invariants
/// - `load_desired_state` returns a fully consistent snapshot: it never
///   observes a partial write from a concurrent `append_audit_event` or
///   from an external editor of the underlying store.
pub trait RuleStore: Send + Sync {
    /// Loads the desired state for one switch.
    fn load_desired_state(
        &self,
        dpid: DatapathId,
    ) -> impl Future<Output = Result<DesiredState, RuleStoreError>> + Send;

    /// Loads the desired state for every switch known to the store,
    /// keyed by dpid.
    fn load_all_desired_state(
        &self,
    ) -> impl Future<Output = Result<Vec<(DatapathId, DesiredState)>, RuleStoreError>> + Send;

    /// Appends one audit event to the durable log.
    fn append_audit_event(
        &self,
        event: &AuditEvent,
    ) -> impl Future<Output = Result<(), RuleStoreError>> + Send;
}

// ============================================================================
// SECTION: SwitchTransport
// ============================================================================

/// Error returned by a [`SwitchTransport`] operation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The switch is not currently connected.
    #[error("switch {0} is not connected")]
    NotConnected(DatapathId),
    /// The underlying connection failed while sending.
    #[error("send to switch {dpid} failed: {message}")]
    SendFailed {
        /// Switch the send was addressed to.
        dpid: DatapathId,
        /// Transport-specific failure detail.
        message: String,
    },
}

/// Delivery of OpenFlow messages to a connected switch.
///
/// # Errors
///
/// Implementations return [`TransportError`] when a switch is not
/// connected or a send fails. A successful return means the message was
/// handed to the switch's connection; it does not guarantee the switch
/// applied it, which is why the monitor loop re-reads installed state on
/// its next pass rather than trusting the send outcome alone.
pub trait SwitchTransport: Send + Sync {
    /// Sends a pre-encoded FLOW_MOD message to `dpid`.
    fn send_flow_mod(
        &self,
        dpid: DatapathId,
        message: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

// ============================================================================
// SECTION: SwitchEventSource
// ============================================================================

/// An event describing a switch's connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectEvent {
    /// A switch completed its feature handshake and is ready for
    /// programming.
    FeaturesReplied {
        /// The switch's reported identifier.
        dpid: DatapathId,
    },
    /// A switch's connection was lost.
    Disconnected {
        /// The switch that disconnected.
        dpid: DatapathId,
    },
}

/// Error returned by a [`SwitchEventSource`] operation.
#[derive(Debug, thiserror::Error)]
pub enum EventSourceError {
    /// The event source was closed and will produce no further events.
    #[error("event source closed")]
    Closed,
    /// The event source failed while waiting for the next event.
    #[error("event source error: {0}")]
    Failed(String),
}

/// A source of switch connection events, consumed by session bootstrap.
///
/// # Errors
///
/// Returns [`EventSourceError::Closed`] once no further events will ever
/// arrive; callers should treat this as terminal rather than retry.
pub trait SwitchEventSource: Send {
    /// Waits for and returns the next connection event.
    fn next_event(&mut self) -> impl Future<Output = Result<ConnectEvent, EventSourceError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_messages_name_the_dpid() {
        let err = TransportError::NotConnected(DatapathId::new(7));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn connect_event_equality() {
        let a = ConnectEvent::FeaturesReplied { dpid: DatapathId::new(1) };
        let b = ConnectEvent::FeaturesReplied { dpid: DatapathId::new(1) };
        assert_eq!(a, b);
    }
}
