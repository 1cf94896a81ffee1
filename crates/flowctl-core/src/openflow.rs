// crates/flowctl-core/src/openflow.rs
// ============================================================================
// Module: Flowctl OpenFlow Wire Encoding
// Description: OpenFlow 1.3 FLOW_MOD message construction for the subset of
//   match fields and actions flowctl supports.
// Purpose: Translate domain `Rule`/`Action` values into wire bytes, without
//   depending on a specific transport.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! This module builds raw OpenFlow 1.3 `OFPT_FLOW_MOD` messages. It does not
//! open sockets or read replies; a [`crate::interfaces::SwitchTransport`]
//! implementation is responsible for delivery. Encoding follows the subset
//! of the OpenFlow 1.3 wire format exercised by flowctl: a single
//! `OFPIT_APPLY_ACTIONS` instruction, `OFPM_OXM` match, and the `OUTPUT`,
//! `NORMAL`, and drop (empty instruction) actions.

use crate::model::Action;
use crate::model::MatchSpec;

// ============================================================================
// SECTION: Wire constants
// ============================================================================

/// OpenFlow protocol version byte for 1.3.
pub const OFP_VERSION: u8 = 0x04;

/// `OFPT_HELLO` message type.
pub const OFPT_HELLO: u8 = 0;
/// `OFPT_FEATURES_REQUEST` message type.
pub const OFPT_FEATURES_REQUEST: u8 = 5;
/// `OFPT_FEATURES_REPLY` message type.
pub const OFPT_FEATURES_REPLY: u8 = 6;
/// `OFPT_FLOW_MOD` message type.
pub const OFPT_FLOW_MOD: u8 = 14;

/// Reserved port meaning "send to controller".
pub const OFPP_CONTROLLER: u32 = 0xFFFF_FFFD;
/// Reserved port meaning "use the switch's normal pipeline".
pub const OFPP_NORMAL: u32 = 0xFFFF_FFFA;
/// Reserved port wildcard meaning "any port".
pub const OFPP_ANY: u32 = 0xFFFF_FFFF;
/// Reserved group wildcard meaning "any group".
pub const OFPG_ANY: u32 = 0xFFFF_FFFF;

/// `max_len` value meaning "do not buffer; send the full packet".
pub const OFPCML_NO_BUFFER: u16 = 0xFFFF;

/// `OFPFC_ADD` flow-mod command: add a new flow.
pub const OFPFC_ADD: u8 = 0;
/// `OFPFC_DELETE` flow-mod command: delete matching flows.
pub const OFPFC_DELETE: u8 = 3;

const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPAT_OUTPUT: u16 = 0;
const OFPMT_OXM: u16 = 1;
const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000;
const OFPXMT_OFB_IN_PORT: u8 = 0;
const OFPXMT_OFB_ETH_TYPE: u8 = 5;
const OFPXMT_OFB_IP_PROTO: u8 = 10;
const OFPXMT_OFB_IPV4_SRC: u8 = 11;
const OFPXMT_OFB_IPV4_DST: u8 = 12;
const OFPXMT_OFB_TCP_SRC: u8 = 13;
const OFPXMT_OFB_TCP_DST: u8 = 14;

// ============================================================================
// SECTION: FlowMod builder
// ============================================================================

/// A fully encoded `OFPT_FLOW_MOD` message, ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    /// The encoded message.
    bytes: Vec<u8>,
}

impl FlowMod {
    /// Returns the encoded message bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the message, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Builds a FLOW_MOD that adds or replaces a flow entry.
    ///
    /// `cookie` is typically a [`crate::identifiers::RuleId`]'s raw value.
    #[must_use]
    pub fn add(cookie: u64, priority: u16, match_spec: &MatchSpec, actions: &[Action]) -> Self {
        Self::build(OFPFC_ADD, cookie, priority, match_spec, actions)
    }

    /// Builds a FLOW_MOD that deletes flows matching `match_spec` and
    /// `cookie`, with `out_port`/`out_group` wildcarded so the delete is
    /// not scoped to a particular output action.
    #[must_use]
    pub fn delete(cookie: u64, priority: u16, match_spec: &MatchSpec) -> Self {
        Self::build(OFPFC_DELETE, cookie, priority, match_spec, &[])
    }

    /// Builds the table-miss flow: priority 0, wildcard match, send to
    /// controller without buffering.
    #[must_use]
    pub fn table_miss() -> Self {
        Self::add(0, 0, &MatchSpec::default(), &[Action::Output { port: OFPP_CONTROLLER }])
    }

    /// Builds the fallback flow installed when a switch has zero desired
    /// rules: priority 1, wildcard match, `OFPP_NORMAL`.
    #[must_use]
    pub fn normal_fallback() -> Self {
        Self::add(0, 1, &MatchSpec::default(), &[Action::Normal])
    }

    fn build(command: u8, cookie: u64, priority: u16, match_spec: &MatchSpec, actions: &[Action]) -> Self {
        let match_bytes = encode_match(match_spec);
        let instructions = if command == OFPFC_DELETE { Vec::new() } else { encode_apply_actions(actions) };

        let body_len = 40 + match_bytes.len() + instructions.len();
        let total_len = 8 + body_len;
        let mut bytes = Vec::with_capacity(total_len);

        // OpenFlow header: version, type, length, xid.
        bytes.push(OFP_VERSION);
        bytes.push(OFPT_FLOW_MOD);
        bytes.extend_from_slice(&u16_to_be(total_len_as_u16(total_len)));
        bytes.extend_from_slice(&[0, 0, 0, 0]); // xid filled by the transport.

        // FLOW_MOD body up to the match header.
        bytes.extend_from_slice(&cookie.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes()); // cookie_mask.
        bytes.push(0); // table_id.
        bytes.push(command);
        bytes.extend_from_slice(&0u16.to_be_bytes()); // idle_timeout.
        bytes.extend_from_slice(&0u16.to_be_bytes()); // hard_timeout.
        bytes.extend_from_slice(&priority.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes()); // buffer_id.
        bytes.extend_from_slice(&out_port_for(command).to_be_bytes());
        bytes.extend_from_slice(&OFPG_ANY.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes()); // flags.
        bytes.extend_from_slice(&[0, 0]); // padding.

        bytes.extend_from_slice(&match_bytes);
        bytes.extend_from_slice(&instructions);

        Self { bytes }
    }
}

const fn out_port_for(command: u8) -> u32 {
    if command == OFPFC_DELETE {
        OFPP_ANY
    } else {
        0
    }
}

fn total_len_as_u16(len: usize) -> u16 {
    // FLOW_MOD messages in this subset never approach u16::MAX.
    u16::try_from(len).unwrap_or(u16::MAX)
}

fn u16_to_be(v: u16) -> [u8; 2] {
    v.to_be_bytes()
}

// ============================================================================
// SECTION: Match encoding
// ============================================================================

fn encode_match(match_spec: &MatchSpec) -> Vec<u8> {
    let mut oxm_fields = Vec::new();
    if let Some(in_port) = match_spec.in_port {
        push_oxm_u32(&mut oxm_fields, OFPXMT_OFB_IN_PORT, in_port);
    }
    if let Some(eth_type) = match_spec.eth_type {
        push_oxm_bytes(&mut oxm_fields, OFPXMT_OFB_ETH_TYPE, &eth_type.to_be_bytes());
    }
    if let Some(proto) = match_spec.ip_proto {
        push_oxm_bytes(&mut oxm_fields, OFPXMT_OFB_IP_PROTO, &[proto]);
    }
    if let Some(ref addr) = match_spec.ipv4_src {
        if let Some((value, mask)) = parse_ipv4_cidr(addr) {
            push_oxm_ipv4(&mut oxm_fields, OFPXMT_OFB_IPV4_SRC, value, mask);
        }
    }
    if let Some(ref addr) = match_spec.ipv4_dst {
        if let Some((value, mask)) = parse_ipv4_cidr(addr) {
            push_oxm_ipv4(&mut oxm_fields, OFPXMT_OFB_IPV4_DST, value, mask);
        }
    }
    if let Some(port) = match_spec.tcp_src {
        push_oxm_bytes(&mut oxm_fields, OFPXMT_OFB_TCP_SRC, &port.to_be_bytes());
    }
    if let Some(port) = match_spec.tcp_dst {
        push_oxm_bytes(&mut oxm_fields, OFPXMT_OFB_TCP_DST, &port.to_be_bytes());
    }

    let oxm_len = oxm_fields.len();
    let match_len = 4 + oxm_len;
    let padded_len = match_len.div_ceil(8) * 8;

    let mut out = Vec::with_capacity(padded_len);
    out.extend_from_slice(&OFPMT_OXM.to_be_bytes());
    out.extend_from_slice(&u16_to_be(u16::try_from(match_len).unwrap_or(u16::MAX)));
    out.extend_from_slice(&oxm_fields);
    out.resize(padded_len, 0);
    out
}

fn push_oxm_u32(buf: &mut Vec<u8>, field: u8, value: u32) {
    push_oxm_bytes(buf, field, &value.to_be_bytes());
}

fn push_oxm_bytes(buf: &mut Vec<u8>, field: u8, value: &[u8]) {
    buf.extend_from_slice(&OXM_CLASS_OPENFLOW_BASIC.to_be_bytes());
    // has_mask is always 0 for this subset: exact-match only.
    buf.push(field << 1);
    let length = u8::try_from(value.len()).unwrap_or(u8::MAX);
    buf.push(length);
    buf.extend_from_slice(value);
}

/// Pushes an IPv4 OXM TLV, setting `has_mask` and appending the mask bytes
/// when `mask` is not the all-ones (`/32`) value.
fn push_oxm_ipv4(buf: &mut Vec<u8>, field: u8, value: [u8; 4], mask: [u8; 4]) {
    if mask == [0xFF, 0xFF, 0xFF, 0xFF] {
        push_oxm_bytes(buf, field, &value);
        return;
    }
    buf.extend_from_slice(&OXM_CLASS_OPENFLOW_BASIC.to_be_bytes());
    buf.push((field << 1) | 1);
    buf.push(8);
    buf.extend_from_slice(&value);
    buf.extend_from_slice(&mask);
}

/// Parses a dotted-quad or CIDR (`addr/prefix`) IPv4 string into
/// `(address_bytes, mask_bytes)`. A bare dotted-quad is treated as `/32`.
/// Returns `None` for malformed input, which the match simply omits the
/// field for (wildcard).
fn parse_ipv4_cidr(text: &str) -> Option<([u8; 4], [u8; 4])> {
    let (addr_part, prefix_len) = match text.split_once('/') {
        Some((addr, prefix)) => (addr, prefix.parse::<u32>().ok()?),
        None => (text, 32),
    };
    if prefix_len > 32 {
        return None;
    }
    let addr = parse_ipv4(addr_part)?;
    let mask_bits: u32 = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
    Some((addr, mask_bits.to_be_bytes()))
}

fn parse_ipv4(text: &str) -> Option<[u8; 4]> {
    let mut out = [0u8; 4];
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    for (slot, part) in out.iter_mut().zip(parts.iter()) {
        *slot = part.parse().ok()?;
    }
    Some(out)
}

// ============================================================================
// SECTION: Instruction / action encoding
// ============================================================================

/// Encodes the single `APPLY_ACTIONS` instruction carrying `actions`.
///
/// Drop is represented as a present instruction with zero actions
/// (`OFPInstructionActions(APPLY_ACTIONS, [])`), not as an absent
/// instruction: a switch that receives no instructions at all behaves
/// differently from one told to run an empty action list.
fn encode_apply_actions(actions: &[Action]) -> Vec<u8> {
    let action_bytes: Vec<u8> = actions.iter().flat_map(|a| encode_action(a).into_iter()).collect();
    let instr_len = 8 + action_bytes.len();
    let mut out = Vec::with_capacity(instr_len);
    out.extend_from_slice(&OFPIT_APPLY_ACTIONS.to_be_bytes());
    out.extend_from_slice(&u16_to_be(u16::try_from(instr_len).unwrap_or(u16::MAX)));
    out.extend_from_slice(&[0, 0, 0, 0]); // padding.
    out.extend_from_slice(&action_bytes);
    out
}

fn encode_action(action: &Action) -> Vec<u8> {
    match action {
        Action::Output { port } => {
            let mut out = Vec::with_capacity(16);
            out.extend_from_slice(&OFPAT_OUTPUT.to_be_bytes());
            out.extend_from_slice(&16u16.to_be_bytes());
            out.extend_from_slice(&port.to_be_bytes());
            out.extend_from_slice(&OFPCML_NO_BUFFER.to_be_bytes());
            out.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // padding.
            out
        }
        Action::Normal => encode_action(&Action::Output { port: OFPP_NORMAL }),
        Action::Drop => Vec::new(),
    }
}

// ============================================================================
// SECTION: Handshake messages
// ============================================================================

/// Error parsing a handshake message received from a switch.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HandshakeParseError {
    /// The message was shorter than its declared length, or shorter than
    /// the minimum size for its type.
    #[error("message too short: got {got} bytes, expected at least {expected}")]
    TooShort {
        /// Bytes actually present.
        got: usize,
        /// Minimum bytes required.
        expected: usize,
    },
    /// The message type byte was not `OFPT_FEATURES_REPLY`.
    #[error("expected FEATURES_REPLY (type {expected}), got type {got}")]
    UnexpectedType {
        /// Type byte actually present.
        got: u8,
        /// Type byte expected.
        expected: u8,
    },
}

/// Builds an `OFPT_HELLO` message with an empty body.
#[must_use]
pub fn encode_hello() -> Vec<u8> {
    encode_header_only(OFPT_HELLO)
}

/// Builds an `OFPT_FEATURES_REQUEST` message with an empty body.
#[must_use]
pub fn encode_features_request() -> Vec<u8> {
    encode_header_only(OFPT_FEATURES_REQUEST)
}

fn encode_header_only(message_type: u8) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8);
    bytes.push(OFP_VERSION);
    bytes.push(message_type);
    bytes.extend_from_slice(&8u16.to_be_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

/// Reads the 4-byte OpenFlow header common to every message, returning
/// `(message_type, declared_length)`.
///
/// # Errors
///
/// Returns [`HandshakeParseError::TooShort`] if fewer than 4 bytes are
/// given.
pub fn peek_header(bytes: &[u8]) -> Result<(u8, u16), HandshakeParseError> {
    if bytes.len() < 4 {
        return Err(HandshakeParseError::TooShort { got: bytes.len(), expected: 4 });
    }
    Ok((bytes[1], u16::from_be_bytes([bytes[2], bytes[3]])))
}

/// Parses an `OFPT_FEATURES_REPLY` message and returns the switch's
/// reported datapath id.
///
/// # Errors
///
/// Returns [`HandshakeParseError::TooShort`] if the message is shorter
/// than the fixed FEATURES_REPLY header (8-byte header + 8-byte
/// `datapath_id` + `n_buffers`/`n_tables`/etc.), or
/// [`HandshakeParseError::UnexpectedType`] if the message is not a
/// FEATURES_REPLY.
pub fn parse_features_reply(bytes: &[u8]) -> Result<crate::identifiers::DatapathId, HandshakeParseError> {
    const MIN_LEN: usize = 8 + 8;
    if bytes.len() < MIN_LEN {
        return Err(HandshakeParseError::TooShort { got: bytes.len(), expected: MIN_LEN });
    }
    if bytes[1] != OFPT_FEATURES_REPLY {
        return Err(HandshakeParseError::UnexpectedType { got: bytes[1], expected: OFPT_FEATURES_REPLY });
    }
    #[allow(clippy::expect_used, reason = "slice is exactly 8 bytes by construction; MIN_LEN already validated above")]
    let raw = u64::from_be_bytes(bytes[8..16].try_into().expect("8 bytes"));
    Ok(crate::identifiers::DatapathId::new(raw))
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

    #[test]
    fn table_miss_targets_controller_without_buffering() {
        let fm = FlowMod::table_miss();
        let bytes = fm.as_bytes();
        assert_eq!(bytes[0], OFP_VERSION);
        assert_eq!(bytes[1], OFPT_FLOW_MOD);
        assert!(bytes.windows(4).any(|w| w == OFPP_CONTROLLER.to_be_bytes()));
        assert!(bytes.windows(2).any(|w| w == OFPCML_NO_BUFFER.to_be_bytes()));
    }

    #[test]
    fn normal_fallback_uses_priority_one() {
        let fm = FlowMod::normal_fallback();
        let priority = u16::from_be_bytes([fm.as_bytes()[30], fm.as_bytes()[31]]);
        assert_eq!(priority, 1);
    }

    #[test]
    fn delete_wildcards_out_port_and_group() {
        let fm = FlowMod::delete(5, 10, &MatchSpec::default());
        let bytes = fm.as_bytes();
        assert!(bytes.windows(4).any(|w| w == OFPP_ANY.to_be_bytes()));
        assert!(bytes.windows(4).any(|w| w == OFPG_ANY.to_be_bytes()));
        assert_eq!(bytes[25], OFPFC_DELETE);
    }

    #[test]
    fn add_carries_cookie_as_given() {
        let fm = FlowMod::add(42, 1, &MatchSpec::default(), &[Action::Drop]);
        let cookie = u64::from_be_bytes(fm.as_bytes()[8..16].try_into().expect("8 bytes"));
        assert_eq!(cookie, 42);
    }

    #[test]
    fn match_encoding_is_8_byte_aligned() {
        let match_spec = MatchSpec {
            in_port: Some(3),
            eth_type: Some(0x0800),
            tcp_src: Some(80),
            ..MatchSpec::default()
        };
        let encoded = encode_match(&match_spec);
        assert_eq!(encoded.len() % 8, 0);
    }

    #[test]
    fn parse_ipv4_rejects_malformed_input() {
        assert!(parse_ipv4("not-an-address").is_none());
    }

    #[test]
    fn cidr_with_non_default_prefix_sets_has_mask() {
        let match_spec = MatchSpec { ipv4_src: Some("10.0.0.0/24".to_owned()), ..MatchSpec::default() };
        let encoded = encode_match(&match_spec);
        // has_mask bit set on the OXM field byte (index 2 of the TLV header).
        assert_eq!(encoded[6] & 1, 1);
        assert_eq!(encoded[7], 8); // 4 value bytes + 4 mask bytes.
    }

    #[test]
    fn bare_dotted_quad_has_no_mask() {
        let match_spec = MatchSpec { ipv4_src: Some("10.0.0.1".to_owned()), ..MatchSpec::default() };
        let encoded = encode_match(&match_spec);
        assert_eq!(encoded[6] & 1, 0);
        assert_eq!(encoded[7], 4);
    }

    #[test]
    fn parse_features_reply_extracts_dpid() {
        let mut bytes = encode_header_only(OFPT_FEATURES_REPLY);
        bytes.extend_from_slice(&42u64.to_be_bytes());
        let dpid = parse_features_reply(&bytes).expect("parses");
        assert_eq!(dpid.get(), 42);
    }

    #[test]
    fn parse_features_reply_rejects_wrong_type() {
        let mut bytes = encode_header_only(OFPT_HELLO);
        bytes.extend_from_slice(&42u64.to_be_bytes());
        assert!(matches!(parse_features_reply(&bytes), Err(HandshakeParseError::UnexpectedType { .. })));
    }

    #[test]
    fn peek_header_reports_declared_length() {
        let hello = encode_hello();
        let (msg_type, len) = peek_header(&hello).expect("parses");
        assert_eq!(msg_type, OFPT_HELLO);
        assert_eq!(len, 8);
    }
}
