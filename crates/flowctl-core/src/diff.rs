// crates/flowctl-core/src/diff.rs
// ============================================================================
// Module: Flowctl Diff Engine
// Description: Pure comparison of two desired-state snapshots into ordered
//   reconciliation actions.
// Purpose: Isolate the comparison logic from I/O so it can be exhaustively
//   unit- and property-tested.
// Dependencies: none beyond flowctl-core's own model
// ============================================================================

//! ## Overview
//! `diff` mirrors the legacy controller's `comparar_reglas`: rules present
//! only in `prev` are deleted, rules present only in `next` are installed,
//! and rules present in both but differing are modified. Deletions are
//! always ordered before installs and modifies, matching the legacy pass
//! order (`eliminar` loop runs to completion before any
//! `instalar`/`actualizar`).
//!
//! `prev` is the Monitor Loop's cache of what it asked for on the
//! *previous* pass, not a snapshot of what is actually installed on the
//! switch: the cache tracks intent, not confirmed success. `next` is the
//! store's current desired state for the same dpid.

use crate::identifiers::RuleId;
use crate::model::DesiredState;
use crate::model::Rule;

// ============================================================================
// SECTION: ReconcileAction
// ============================================================================

/// One unit of reconciliation work produced by [`diff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Remove a rule that was previously desired but no longer is.
    Delete {
        /// Rule to remove.
        rule_id: RuleId,
        /// Contents the rule had on the previous pass, needed to scope the
        /// switch-side delete to exactly this rule's match and priority.
        prev_rule: Rule,
    },
    /// Install a rule that is newly desired.
    Install {
        /// Rule to install.
        rule: Rule,
    },
    /// Replace a previously desired rule whose contents changed.
    Modify {
        /// Contents the rule had on the previous pass.
        prev_rule: Rule,
        /// Contents the rule should have now.
        next_rule: Rule,
    },
}

impl ReconcileAction {
    /// Returns the rule id this action concerns.
    #[must_use]
    pub const fn rule_id(&self) -> RuleId {
        match self {
            Self::Delete { rule_id, .. } => *rule_id,
            Self::Install { rule } => rule.rule_id,
            Self::Modify { next_rule, .. } => next_rule.rule_id,
        }
    }
}

// ============================================================================
// SECTION: diff
// ============================================================================

/// Compares a previous desired-state snapshot against the current one and
/// returns the ordered actions needed to reconcile the two.
///
/// Deletions are always returned before installs and modifies. Within each
/// group, actions are ordered by ascending [`RuleId`] for determinism.
///
/// # Invariants
/// - A rule present in both maps with identical contents produces no
///   action.
/// - A rule's dpid is not considered: callers are expected to diff per
///   switch, each call covering exactly one dpid's `prev`/`next` pair. A
///   rule that migrates to a different dpid surfaces as a `Delete` in its
///   old dpid's diff and an `Install` in its new dpid's diff, not a single
///   cross-switch move.
#[must_use]
pub fn diff(prev: &DesiredState, next: &DesiredState) -> Vec<ReconcileAction> {
    let mut deletes = Vec::new();
    let mut installs = Vec::new();
    let mut modifies = Vec::new();

    for (rule_id, prev_rule) in prev {
        if !next.contains_key(rule_id) {
            deletes.push(ReconcileAction::Delete { rule_id: *rule_id, prev_rule: prev_rule.clone() });
        }
    }

    for (rule_id, next_rule) in next {
        match prev.get(rule_id) {
            None => installs.push(ReconcileAction::Install { rule: next_rule.clone() }),
            Some(prev_rule) => {
                let unchanged = prev_rule.match_spec == next_rule.match_spec
                    && prev_rule.priority == next_rule.priority
                    && prev_rule.actions == next_rule.actions;
                if !unchanged {
                    modifies.push(ReconcileAction::Modify {
                        prev_rule: prev_rule.clone(),
                        next_rule: next_rule.clone(),
                    });
                }
            }
        }
    }

    let mut actions = deletes;
    actions.extend(installs);
    actions.extend(modifies);
    actions
}
