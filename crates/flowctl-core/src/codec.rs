// crates/flowctl-core/src/codec.rs
// ============================================================================
// Module: Flowctl Rule Codec
// Description: Translation between a store's raw row representation and the
//   typed `Rule`/`AuditEvent` domain model.
// Purpose: Keep storage-format parsing out of the domain types themselves.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A store persists a rule's match criteria as individual columns (mirroring
//! `reglas`) and its action list as JSON text. This module assembles the
//! former into a [`MatchSpec`] and parses the latter into `Vec<`[`Action`]`>`,
//! silently dropping any action entry whose `type` this controller does not
//! recognize. The legacy parser refuses to let one malformed action abort
//! an otherwise valid rule.

use crate::identifiers::DatapathId;
use crate::identifiers::RuleId;
use crate::identifiers::RuleIdRangeError;
use crate::model::Action;
use crate::model::AuditEvent;
use crate::model::AuditKind;
use crate::model::MatchSpec;
use crate::model::Rule;

// ============================================================================
// SECTION: RuleRow
// ============================================================================

/// A rule as read back from a store, before validation.
///
/// Field names mirror the `reglas` table's columns (§6): match criteria are
/// individual nullable columns, while `actions` remains the JSON array the
/// store persists verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRow {
    /// Raw rule identifier, not yet range-checked.
    pub rule_id: u64,
    /// Raw datapath identifier.
    pub dpid: u64,
    /// Flow table priority.
    pub priority: u16,
    /// Ethertype; mandatory and non-zero per the `reglas` schema.
    pub eth_type: u16,
    /// IP protocol number, if the rule constrains it.
    pub ip_proto: Option<u8>,
    /// IPv4 source address or CIDR, if the rule constrains it.
    pub ipv4_src: Option<String>,
    /// IPv4 destination address or CIDR, if the rule constrains it.
    pub ipv4_dst: Option<String>,
    /// TCP source port, if the rule constrains it.
    pub tcp_src: Option<u16>,
    /// TCP destination port, if the rule constrains it.
    pub tcp_dst: Option<u16>,
    /// Ingress port, if the rule constrains it.
    pub in_port: Option<u32>,
    /// Action list serialized as JSON.
    pub actions_json: String,
}

// ============================================================================
// SECTION: DecodeError
// ============================================================================

/// Error decoding a stored row into a domain [`Rule`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The rule id did not fall in `RuleId`'s valid range.
    #[error("invalid rule id: {0}")]
    InvalidRuleId(#[from] RuleIdRangeError),
    /// `eth_type` was zero, violating the `reglas` schema's `CHECK(eth_type
    /// > 0)`.
    #[error("rule {rule_id}: eth_type must be greater than 0")]
    InvalidEthType {
        /// Rule the invalid column belonged to.
        rule_id: u64,
    },
    /// `tcp_src`, `tcp_dst`, or `in_port` was present but zero.
    #[error("rule {rule_id}: {field} must be greater than 0 when present")]
    InvalidPositiveField {
        /// Rule the invalid column belonged to.
        rule_id: u64,
        /// Name of the offending column.
        field: &'static str,
    },
    /// `actions` was a JSON value other than an array, `null`, or a string
    /// (the three forms the legacy parser tolerates).
    #[error("rule {rule_id}: actions column is neither an array, null, nor a string")]
    InvalidActionsShape {
        /// Rule the malformed column belonged to.
        rule_id: u64,
    },
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a raw [`RuleRow`] into a validated [`Rule`].
///
/// # Errors
///
/// Returns [`DecodeError`] when the rule id is out of range, `eth_type` is
/// zero, a present `tcp_src`/`tcp_dst`/`in_port` is zero, or the `actions`
/// column is a JSON value that is neither an array, `null`, nor a string.
/// Unrecognized action `type` tags inside an otherwise well-shaped `actions`
/// column are dropped silently rather than rejected (see
/// [`decode_actions`]).
pub fn decode_rule(row: RuleRow) -> Result<Rule, DecodeError> {
    let rule_id = RuleId::from_raw(row.rule_id)?;

    if row.eth_type == 0 {
        return Err(DecodeError::InvalidEthType { rule_id: row.rule_id });
    }
    require_positive_if_present(row.tcp_src, row.rule_id, "tcp_src")?;
    require_positive_if_present(row.tcp_dst, row.rule_id, "tcp_dst")?;
    require_positive_if_present(row.in_port, row.rule_id, "in_port")?;

    let match_spec = MatchSpec {
        eth_type: Some(row.eth_type),
        ip_proto: row.ip_proto,
        ipv4_src: row.ipv4_src,
        ipv4_dst: row.ipv4_dst,
        tcp_src: row.tcp_src,
        tcp_dst: row.tcp_dst,
        in_port: row.in_port,
    };

    let actions_value: serde_json::Value =
        serde_json::from_str(&row.actions_json).unwrap_or(serde_json::Value::Null);
    let actions = decode_actions(&actions_value, row.rule_id)?;

    Ok(Rule { rule_id, dpid: DatapathId::new(row.dpid), match_spec, priority: row.priority, actions })
}

fn require_positive_if_present(value: Option<impl Into<u32>>, rule_id: u64, field: &'static str) -> Result<(), DecodeError> {
    if value.is_some_and(|v| v.into() == 0) {
        return Err(DecodeError::InvalidPositiveField { rule_id, field });
    }
    Ok(())
}

/// Parses a store's `actions` JSON value into a list of [`Action`]s.
///
/// Accepts three shapes, matching the legacy parser's tolerance:
/// - a JSON array: each element is inspected for a case-insensitive `type`
///   field; `OUTPUT` (with a `port` number), `DROP`, and `NORMAL` are kept,
///   anything else (unknown type, missing/malformed `port`, non-object
///   element) is dropped silently;
/// - `null`: treated as an empty action list;
/// - a string: treated as a JSON array encoded as text (double-encoded
///   `actions` columns seen from some editors) and parsed recursively; a
///   string that does not itself decode to an array also yields an empty
///   list rather than an error.
///
/// Any other JSON value (object, number, boolean) is rejected with
/// [`DecodeError::InvalidActionsShape`].
fn decode_actions(value: &serde_json::Value, rule_id: u64) -> Result<Vec<Action>, DecodeError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => Ok(items.iter().filter_map(decode_one_action).collect()),
        serde_json::Value::String(text) => {
            let nested: serde_json::Value = serde_json::from_str(text).unwrap_or(serde_json::Value::Null);
            match nested {
                serde_json::Value::Array(items) => Ok(items.iter().filter_map(decode_one_action).collect()),
                _ => Ok(Vec::new()),
            }
        }
        serde_json::Value::Object(_) | serde_json::Value::Number(_) | serde_json::Value::Bool(_) => {
            Err(DecodeError::InvalidActionsShape { rule_id })
        }
    }
}

fn decode_one_action(entry: &serde_json::Value) -> Option<Action> {
    let obj = entry.as_object()?;
    let type_tag = obj.get("type")?.as_str()?;
    match type_tag.to_ascii_uppercase().as_str() {
        "OUTPUT" => {
            let port = obj.get("port")?.as_u64()?;
            Some(Action::Output { port: u32::try_from(port).ok()? })
        }
        "DROP" => Some(Action::Drop),
        "NORMAL" => Some(Action::Normal),
        _ => None,
    }
}

/// Encodes a rule's actions as the JSON text a store persists.
///
/// # Errors
///
/// Returns a `serde_json::Error` if serialization fails, which does not
/// happen for well-formed `Action` values.
pub fn encode_actions(actions: &[Action]) -> Result<String, serde_json::Error> {
    serde_json::to_string(actions)
}

/// Builds the [`AuditEvent`] produced by programming `rule` to completion.
///
/// Carries the rule's priority, match, and actions into the event so the
/// `logs` row this produces is a forensic copy of what was programmed,
/// independent of whatever `reglas` holds by the time the log is read.
#[must_use]
pub fn encode_audit(rule: &Rule, kind: AuditKind, timestamp_millis: i64, detail: Option<String>) -> AuditEvent {
    AuditEvent {
        dpid: rule.dpid,
        rule_id: rule.rule_id,
        kind,
        priority: rule.priority,
        match_spec: rule.match_spec.clone(),
        actions: rule.actions.clone(),
        timestamp_millis,
        detail,
    }
}
