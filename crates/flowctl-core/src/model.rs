// crates/flowctl-core/src/model.rs
// ============================================================================
// Module: Flowctl Data Model
// Description: Domain types shared by every flowctl component: matches,
//   actions, rules, desired/installed state, and audit events.
// Purpose: Give C1-C7 a common, strongly typed vocabulary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `MatchSpec` and `Action` model the OpenFlow 1.3 subset this controller
//! understands. `Rule` is the unit a store persists; `DesiredState` and
//! `InstalledMap` are the two snapshots the diff engine compares.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::DatapathId;
use crate::identifiers::RuleId;

// ============================================================================
// SECTION: MatchSpec
// ============================================================================

/// Packet-header match criteria for a flow entry.
///
/// `None` fields are wildcards (match any value). An all-`None` `MatchSpec`
/// matches every packet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchSpec {
    /// Ethertype, e.g. `0x0800` for IPv4. Required whenever any L3/L4 field
    /// below is present.
    pub eth_type: Option<u16>,
    /// IP protocol number (e.g. 6 for TCP, 17 for UDP).
    pub ip_proto: Option<u8>,
    /// IPv4 source address, dotted-quad or CIDR (`"10.0.0.0/24"`).
    pub ipv4_src: Option<String>,
    /// IPv4 destination address, dotted-quad or CIDR.
    pub ipv4_dst: Option<String>,
    /// TCP source port.
    pub tcp_src: Option<u16>,
    /// TCP destination port.
    pub tcp_dst: Option<u16>,
    /// Ingress switch port.
    pub in_port: Option<u32>,
}

impl MatchSpec {
    /// Returns `true` when every field is a wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self == &Self::default()
    }
}

// ============================================================================
// SECTION: Action
// ============================================================================

/// An OpenFlow action attached to a rule's `APPLY_ACTIONS` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Action {
    /// Forward the packet out a specific switch port.
    Output {
        /// Target output port.
        port: u32,
    },
    /// Drop the packet (an empty instruction set).
    Drop,
    /// Forward using the switch's normal L2/L3 pipeline (`OFPP_NORMAL`).
    Normal,
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// A single desired flow rule for one switch, as persisted by a store.
///
/// # Invariants
/// - `priority` follows OpenFlow semantics: higher values match first.
/// - `actions` is never inspected for order beyond encode order; flowctl
///   does not deduplicate or sort actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier; doubles as the FLOW_MOD cookie.
    pub rule_id: RuleId,
    /// Switch this rule targets.
    pub dpid: DatapathId,
    /// Match criteria.
    pub match_spec: MatchSpec,
    /// Flow table priority.
    pub priority: u16,
    /// Actions to apply on match.
    pub actions: Vec<Action>,
}

// ============================================================================
// SECTION: DesiredState / InstalledFlow / InstalledMap
// ============================================================================

/// The full set of rules a single switch should have, keyed by [`RuleId`].
///
/// Produced by a [`crate::interfaces::RuleStore`] snapshot read.
pub type DesiredState = BTreeMap<RuleId, Rule>;

/// A rule as currently believed to be programmed on a switch.
///
/// Identical in shape to [`Rule`]; kept as a distinct type because the
/// monitor cache tracks *installed* state, which may briefly diverge from
/// desired state while a reconciliation pass is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledFlow {
    /// Identifier of the installed rule.
    pub rule_id: RuleId,
    /// Switch the rule is installed on.
    pub dpid: DatapathId,
    /// Match criteria as last programmed.
    pub match_spec: MatchSpec,
    /// Priority as last programmed.
    pub priority: u16,
    /// Actions as last programmed.
    pub actions: Vec<Action>,
}

impl From<&Rule> for InstalledFlow {
    fn from(rule: &Rule) -> Self {
        Self {
            rule_id: rule.rule_id,
            dpid: rule.dpid,
            match_spec: rule.match_spec.clone(),
            priority: rule.priority,
            actions: rule.actions.clone(),
        }
    }
}

/// The monitor's cached view of what is actually installed on a switch.
pub type InstalledMap = BTreeMap<RuleId, InstalledFlow>;

// ============================================================================
// SECTION: SwitchSession
// ============================================================================

/// State tracked for a connected switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSession {
    /// Switch identifier reported in its feature reply.
    pub dpid: DatapathId,
    /// Monotonic logical connection sequence number.
    ///
    /// Incremented each time the switch reconnects; used to detect and
    /// discard stale events from a connection that has since been replaced.
    pub generation: u64,
}

// ============================================================================
// SECTION: AuditEvent
// ============================================================================

/// The kind of change an [`AuditEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditKind {
    /// A rule was newly installed.
    Installed,
    /// An existing rule was replaced with new contents.
    Modified,
    /// A rule was removed.
    Deleted,
}

impl AuditKind {
    /// Returns the literal audit-log token for this kind.
    ///
    /// Matches the original controller's Spanish-language audit
    /// vocabulary, preserved here for log continuity with the legacy
    /// `logs` table.
    #[must_use]
    pub const fn as_log_literal(self) -> &'static str {
        match self {
            Self::Installed => "INSTALADA",
            Self::Modified => "MODIFICADA",
            Self::Deleted => "ELIMINADA",
        }
    }
}

/// A record of one flow-programming outcome, appended to the audit log.
///
/// Carries the full `reglas` projection (priority, match, actions) alongside
/// the kind of change, so the `logs` table row this produces is a forensic
/// copy of exactly what was programmed, not just a pointer back to a
/// `reglas` row that may since have changed or been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Switch the change applied to.
    pub dpid: DatapathId,
    /// Rule the change applied to.
    pub rule_id: RuleId,
    /// What kind of change occurred.
    pub kind: AuditKind,
    /// Priority the rule carried at the time of this event.
    pub priority: u16,
    /// Match criteria the rule carried at the time of this event.
    pub match_spec: MatchSpec,
    /// Actions the rule carried at the time of this event.
    pub actions: Vec<Action>,
    /// Caller-supplied timestamp, milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    /// Free-form detail, e.g. an error message when programming failed.
    pub detail: Option<String>,
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
    fn wildcard_match_is_default() {
        assert!(MatchSpec::default().is_wildcard());
    }

    #[test]
    fn audit_kind_literals_match_legacy_vocabulary() {
        assert_eq!(AuditKind::Installed.as_log_literal(), "INSTALADA");
        assert_eq!(AuditKind::Modified.as_log_literal(), "MODIFICADA");
        assert_eq!(AuditKind::Deleted.as_log_literal(), "ELIMINADA");
    }

    #[test]
    fn installed_flow_from_rule_copies_fields() {
        let rule = Rule {
            rule_id: RuleId::from_raw(1).expect("in range"),
            dpid: DatapathId::new(1),
            match_spec: MatchSpec::default(),
            priority: 10,
            actions: vec![Action::Drop],
        };
        let installed = InstalledFlow::from(&rule);
        assert_eq!(installed.rule_id, rule.rule_id);
        assert_eq!(installed.priority, rule.priority);
        assert_eq!(installed.actions, rule.actions);
    }
}
