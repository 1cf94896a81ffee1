// crates/flowctl-cli/src/transport.rs
// ============================================================================
// Module: TCP Switch Transport
// Description: `SwitchTransport` implementation that hands FLOW_MOD bytes to
//   a per-connection writer task over an unbounded channel.
// Purpose: Let the monitor/bootstrap crates send messages without knowing
//   about sockets; the listener task owns the actual `TcpStream` halves.
// Dependencies: flowctl-core, tokio (sync)
// ============================================================================

//! ## Overview
//! The listener registers a sender here as soon as a switch completes its
//! feature handshake, and removes it when the connection drops. Sending is
//! fire-and-forget from the caller's perspective: a successful return means
//! the message was queued for the connection's writer task, not that the
//! switch has acknowledged it. OpenFlow 1.3 FLOW_MOD has no reply.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use flowctl_core::interfaces::SwitchTransport;
use flowctl_core::interfaces::TransportError;
use flowctl_core::DatapathId;
use tokio::sync::mpsc;

/// Shared registry of writer-task senders, one per connected switch.
#[derive(Clone, Default)]
pub struct TcpSwitchTransport {
    /// Each connected switch's writer-task sender, keyed by dpid.
    senders: Arc<Mutex<HashMap<DatapathId, mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl TcpSwitchTransport {
    /// Creates an empty transport with no connected switches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the writer-task sender for a newly connected switch,
    /// replacing any prior registration for the same dpid.
    pub fn register(&self, dpid: DatapathId, sender: mpsc::UnboundedSender<Vec<u8>>) {
        self.senders.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(dpid, sender);
    }

    /// Removes a switch's writer-task sender.
    pub fn unregister(&self, dpid: DatapathId) {
        self.senders.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&dpid);
    }
}

impl SwitchTransport for TcpSwitchTransport {
    async fn send_flow_mod(&self, dpid: DatapathId, message: &[u8]) -> Result<(), TransportError> {
        let sender = {
            let guard = self.senders.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.get(&dpid).cloned()
        };
        let Some(sender) = sender else {
            return Err(TransportError::NotConnected(dpid));
        };
        sender
            .send(message.to_vec())
            .map_err(|_| TransportError::SendFailed { dpid, message: "writer task gone".to_owned() })
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        missing_docs,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]
    use super::*;

    #[tokio::test]
    async fn send_to_unregistered_switch_fails() {
        let transport = TcpSwitchTransport::new();
        let err = transport.send_flow_mod(DatapathId::new(1), &[]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(_)));
    }

    #[tokio::test]
    async fn send_to_registered_switch_queues_message() {
        let transport = TcpSwitchTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dpid = DatapathId::new(1);
        transport.register(dpid, tx);

        transport.send_flow_mod(dpid, &[1, 2, 3]).await.expect("sends");
        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn unregister_makes_further_sends_fail() {
        let transport = TcpSwitchTransport::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let dpid = DatapathId::new(1);
        transport.register(dpid, tx);
        transport.unregister(dpid);

        let err = transport.send_flow_mod(dpid, &[]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(_)));
    }
}
