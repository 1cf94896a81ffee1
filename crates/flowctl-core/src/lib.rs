// crates/flowctl-core/src/lib.rs
// ============================================================================
// Crate: flowctl-core
// Description: Domain model, diff engine, OpenFlow wire encoding, and the
//   trait contracts flowctl's store and monitor crates build against.
// ============================================================================

//! # flowctl-core
//!
//! Shared domain types and pure logic for the flowctl SDN rule-reconciliation
//! controller. This crate has no I/O of its own: it defines what a rule is,
//! how to diff desired against installed state, how to encode an OpenFlow
//! 1.3 FLOW_MOD, and the trait seams (`RuleStore`, `SwitchTransport`,
//! `SwitchEventSource`) that concrete backends implement.

#![forbid(unsafe_code)]

pub mod codec;
pub mod diff;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod openflow;
pub mod registry;

pub use codec::decode_rule;
pub use codec::DecodeError;
pub use codec::RuleRow;
pub use diff::diff;
pub use diff::ReconcileAction;
pub use identifiers::DatapathId;
pub use identifiers::RuleId;
pub use identifiers::RuleIdRangeError;
pub use interfaces::ConnectEvent;
pub use interfaces::EventSourceError;
pub use interfaces::RuleStore;
pub use interfaces::RuleStoreError;
pub use interfaces::SwitchEventSource;
pub use interfaces::SwitchTransport;
pub use interfaces::TransportError;
pub use model::Action;
pub use model::AuditEvent;
pub use model::AuditKind;
pub use model::DesiredState;
pub use model::InstalledFlow;
pub use model::InstalledMap;
pub use model::MatchSpec;
pub use model::Rule;
pub use model::SwitchSession;
pub use openflow::encode_features_request;
pub use openflow::encode_hello;
pub use openflow::parse_features_reply;
pub use openflow::peek_header;
pub use openflow::FlowMod;
pub use openflow::HandshakeParseError;
pub use registry::SwitchRegistry;
