// crates/flowctl-cli/src/listener.rs
// ============================================================================
// Module: OpenFlow TCP Listener
// Description: Accepts switch connections, performs the HELLO/FEATURES
//   handshake, and bridges each connection into `TcpSwitchTransport` and a
//   channel of `ConnectEvent`s.
// Purpose: The only place in flowctl that touches a raw socket.
// Dependencies: flowctl-core, tokio (net, io-util, sync), tracing
// ============================================================================

//! ## Overview
//! One task per listener, one task per accepted connection for reading,
//! one task per connection for writing (so a slow switch never blocks
//! `send_flow_mod` callers). The handshake is deliberately minimal: HELLO
//! exchange followed by a FEATURES_REQUEST/REPLY round trip to learn the
//! switch's datapath id, matching the subset of the OpenFlow 1.3
//! connection setup flowctl depends on.

use flowctl_core::interfaces::ConnectEvent;
use flowctl_core::interfaces::EventSourceError;
use flowctl_core::interfaces::SwitchEventSource;
use flowctl_core::DatapathId;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::transport::TcpSwitchTransport;

/// Error establishing or servicing a switch connection.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Binding the listen address failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Runs the accept loop on `addr` until the process is terminated.
///
/// Each accepted connection is handled on its own task; a failure on one
/// connection never affects others or the listener itself.
///
/// # Errors
///
/// Returns [`ListenerError::Bind`] if the listen address cannot be bound.
pub async fn run(
    addr: &str,
    transport: TcpSwitchTransport,
    events: mpsc::UnboundedSender<ConnectEvent>,
) -> Result<(), ListenerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr: addr.to_owned(), source })?;
    tracing::info!(%addr, "openflow listener bound");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "switch connection accepted");
                let transport = transport.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, transport, events).await {
                        tracing::warn!(%peer, %err, "switch connection ended with error");
                    }
                });
            }
            Err(err) => {
                tracing::warn!(%err, "failed to accept switch connection");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake parse error: {0}")]
    Parse(#[from] flowctl_core::HandshakeParseError),
}

async fn handle_connection(
    mut stream: TcpStream,
    transport: TcpSwitchTransport,
    events: mpsc::UnboundedSender<ConnectEvent>,
) -> Result<(), ConnectionError> {
    stream.write_all(&flowctl_core::encode_hello()).await?;
    read_message(&mut stream).await?;

    stream.write_all(&flowctl_core::encode_features_request()).await?;
    let reply = read_message(&mut stream).await?;
    let dpid = flowctl_core::parse_features_reply(&reply)?;
    tracing::info!(%dpid, "switch completed feature handshake");

    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    transport.register(dpid, write_tx);
    let _ = events.send(ConnectEvent::FeaturesReplied { dpid });

    let (mut read_half, mut write_half) = stream.into_split();

    let writer = tokio::spawn(async move {
        while let Some(message) = write_rx.recv().await {
            if write_half.write_all(&message).await.is_err() {
                break;
            }
        }
    });

    let mut buf = [0u8; 4096];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }

    writer.abort();
    transport.unregister(dpid);
    let _ = events.send(ConnectEvent::Disconnected { dpid });
    tracing::info!(%dpid, "switch disconnected");
    Ok(())
}

async fn read_message(stream: &mut TcpStream) -> Result<Vec<u8>, ConnectionError> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let (_, declared_len) = flowctl_core::peek_header(&header)?;
    let mut body = vec![0u8; usize::from(declared_len).saturating_sub(4)];
    if !body.is_empty() {
        stream.read_exact(&mut body).await?;
    }
    let mut message = header.to_vec();
    message.extend_from_slice(&body);
    Ok(message)
}

// ============================================================================
// SECTION: ChannelEventSource
// ============================================================================

/// A [`SwitchEventSource`] backed by an `mpsc` channel fed by [`run`].
pub struct ChannelEventSource {
    /// The channel half fed by [`run`]'s accepted connections.
    receiver: mpsc::UnboundedReceiver<ConnectEvent>,
}

impl ChannelEventSource {
    /// Wraps a receiver half as an event source.
    #[must_use]
    pub const fn new(receiver: mpsc::UnboundedReceiver<ConnectEvent>) -> Self {
        Self { receiver }
    }
}

impl SwitchEventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Result<ConnectEvent, EventSourceError> {
        self.receiver.recv().await.ok_or(EventSourceError::Closed)
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
    async fn channel_event_source_reports_closed_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);
        let mut source = ChannelEventSource::new(rx);
        assert!(matches!(source.next_event().await, Err(EventSourceError::Closed)));
    }

    #[tokio::test]
    async fn channel_event_source_yields_sent_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let dpid = DatapathId::new(1);
        tx.send(ConnectEvent::FeaturesReplied { dpid }).expect("receiver alive");
        let mut source = ChannelEventSource::new(rx);
        let event = source.next_event().await.expect("event");
        assert_eq!(event, ConnectEvent::FeaturesReplied { dpid });
    }
}
