// crates/flowctl-monitor/src/programmer.rs
// ============================================================================
// Module: Flowctl Flow Programmer
// Description: Translates reconciliation actions into FLOW_MOD sends against
//   a switch transport, with the retry/settle timing the legacy controller
//   relied on, and emits audit events.
// Purpose: Isolate "how to program one action" from "when to run a pass"
//   (the monitor loop) and "what changed" (the diff engine).
// Dependencies: flowctl-core, tokio (time), tracing
// ============================================================================

//! ## Overview
//! - Install: a single FLOW_MOD add.
//! - Delete: four FLOW_MOD deletes, 2 seconds apart. The legacy controller
//!   resent the same delete three additional times as insurance against a
//!   switch missing the first message; this implementation preserves that
//!   behavior unchanged.
//! - Modify: a delete of the old contents, a 1 second settle gap, then an
//!   install of the new contents. The settle gap gives the switch time to
//!   apply the delete before the new entry's match might otherwise collide.
//!
//! Every outcome (success or transport failure) is recorded as an
//! [`flowctl_core::AuditEvent`]; programming failures are logged and do not
//! abort the reconciliation pass.

use std::time::Duration;

use flowctl_core::codec::encode_audit;
use flowctl_core::diff::ReconcileAction;
use flowctl_core::interfaces::RuleStore;
use flowctl_core::interfaces::SwitchTransport;
use flowctl_core::AuditKind;
use flowctl_core::DatapathId;
use flowctl_core::FlowMod;
use flowctl_core::InstalledFlow;
use flowctl_core::Rule;

use crate::clock::Clock;

const DELETE_RESEND_COUNT: u32 = 4;
const DELETE_RESEND_GAP: Duration = Duration::from_secs(2);
const MODIFY_SETTLE_GAP: Duration = Duration::from_secs(1);

/// Programs a single [`ReconcileAction`] against `transport`, updating
/// `store`'s audit log with the outcome.
///
/// Returns the resulting [`InstalledFlow`] entry to merge into the
/// monitor's cache: `Some` for install/modify, `None` for delete (the
/// caller removes the entry instead).
///
/// Transport failures are logged and recorded as an audit event with a
/// failure detail; they do not return an `Err`, matching the legacy
/// monitor loop's "log and continue" behavior so one bad action never
/// aborts the rest of a reconciliation pass.
pub async fn apply_action<T, S, C>(
    transport: &T,
    store: &S,
    clock: &C,
    dpid: DatapathId,
    action: ReconcileAction,
) -> Option<InstalledFlow>
where
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    match action {
        ReconcileAction::Delete { rule_id, prev_rule } => {
            let cookie = rule_id.as_cookie();
            // Scope the delete to the rule's last known match and priority
            // so a non-strict DELETE cannot sweep up unrelated flows that
            // happen to share the switch's flow table.
            let message = FlowMod::delete(cookie, prev_rule.priority, &prev_rule.match_spec);
            let mut last_err = None;
            for attempt in 0..DELETE_RESEND_COUNT {
                if attempt > 0 {
                    tokio::time::sleep(DELETE_RESEND_GAP).await;
                }
                if let Err(err) = transport.send_flow_mod(dpid, message.as_bytes()).await {
                    tracing::warn!(%dpid, %rule_id, %err, attempt, "flow delete send failed");
                    last_err = Some(err);
                }
            }
            record_audit(store, clock, &prev_rule, AuditKind::Deleted, last_err.map(|e| e.to_string())).await;
            None
        }
        ReconcileAction::Install { rule } => {
            let outcome = send_install(transport, &rule).await;
            record_audit(store, clock, &rule, AuditKind::Installed, outcome.clone()).await;
            if outcome.is_none() {
                Some(InstalledFlow::from(&rule))
            } else {
                None
            }
        }
        ReconcileAction::Modify { prev_rule, next_rule } => {
            let cookie = prev_rule.rule_id.as_cookie();
            let delete_msg = FlowMod::delete(cookie, prev_rule.priority, &prev_rule.match_spec);
            let delete_err = transport.send_flow_mod(dpid, delete_msg.as_bytes()).await.err();
            if let Some(ref err) = delete_err {
                tracing::warn!(%dpid, rule_id = %prev_rule.rule_id, %err, "flow modify: delete-old send failed");
            }

            tokio::time::sleep(MODIFY_SETTLE_GAP).await;

            let install_outcome = send_install(transport, &next_rule).await;
            let detail = delete_err.map(|e| e.to_string()).or(install_outcome.clone());
            record_audit(store, clock, &next_rule, AuditKind::Modified, detail).await;
            if install_outcome.is_none() {
                Some(InstalledFlow::from(&next_rule))
            } else {
                None
            }
        }
    }
}

async fn send_install<T: SwitchTransport>(transport: &T, rule: &Rule) -> Option<String> {
    let message = FlowMod::add(rule.rule_id.as_cookie(), rule.priority, &rule.match_spec, &rule.actions);
    match transport.send_flow_mod(rule.dpid, message.as_bytes()).await {
        Ok(()) => None,
        Err(err) => {
            tracing::warn!(dpid = %rule.dpid, rule_id = %rule.rule_id, %err, "flow install send failed");
            Some(err.to_string())
        }
    }
}

async fn record_audit<S: RuleStore, C: Clock>(store: &S, clock: &C, rule: &Rule, kind: AuditKind, detail: Option<String>) {
    let dpid = rule.dpid;
    let rule_id = rule.rule_id;
    let event = encode_audit(rule, kind, clock.now_millis(), detail);
    if let Err(err) = store.append_audit_event(&event).await {
        tracing::error!(%dpid, %rule_id, %err, "failed to append audit event");
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
    use std::sync::Arc;
    use std::sync::Mutex;

    use flowctl_core::interfaces::RuleStoreError;
    use flowctl_core::interfaces::TransportError;
    use flowctl_core::Action;
    use flowctl_core::AuditEvent;
    use flowctl_core::DesiredState;
    use flowctl_core::MatchSpec;
    use flowctl_core::RuleId;

    use super::*;
    use crate::clock::FixedClock;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        fail_next: Mutex<bool>,
    }

    impl SwitchTransport for RecordingTransport {
        async fn send_flow_mod(&self, _dpid: DatapathId, message: &[u8]) -> Result<(), TransportError> {
            self.sent.lock().expect("mutex poisoned").push(message.to_vec());
            if *self.fail_next.lock().expect("mutex poisoned") {
                return Err(TransportError::SendFailed { dpid: DatapathId::new(1), message: "boom".to_owned() });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl RuleStore for RecordingStore {
        async fn load_desired_state(&self, _dpid: DatapathId) -> Result<DesiredState, RuleStoreError> {
            Ok(DesiredState::new())
        }

        async fn load_all_desired_state(&self) -> Result<Vec<(DatapathId, DesiredState)>, RuleStoreError> {
            Ok(Vec::new())
        }

        async fn append_audit_event(&self, event: &AuditEvent) -> Result<(), RuleStoreError> {
            self.events.lock().expect("mutex poisoned").push(event.clone());
            Ok(())
        }
    }

    fn sample_rule() -> Rule {
        Rule {
            rule_id: RuleId::from_raw(1).expect("in range"),
            dpid: DatapathId::new(1),
            match_spec: MatchSpec::default(),
            priority: 5,
            actions: vec![Action::Drop],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn install_sends_one_flow_mod_and_audits() {
        let transport = Arc::new(RecordingTransport::default());
        let store = RecordingStore::default();
        let clock = FixedClock(100);
        let rule = sample_rule();

        let result =
            apply_action(transport.as_ref(), &store, &clock, rule.dpid, ReconcileAction::Install { rule: rule.clone() })
                .await;

        assert!(result.is_some());
        assert_eq!(transport.sent.lock().expect("mutex poisoned").len(), 1);
        let events = store.events.lock().expect("mutex poisoned");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::Installed);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_resends_four_times_with_two_second_gaps() {
        let transport = Arc::new(RecordingTransport::default());
        let store = RecordingStore::default();
        let clock = FixedClock(0);
        let prev_rule = sample_rule();
        let rule_id = prev_rule.rule_id;

        let start = tokio::time::Instant::now();
        let result = apply_action(
            transport.as_ref(),
            &store,
            &clock,
            DatapathId::new(1),
            ReconcileAction::Delete { rule_id, prev_rule },
        )
        .await;

        assert!(result.is_none());
        assert_eq!(transport.sent.lock().expect("mutex poisoned").len(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        let events = store.events.lock().expect("mutex poisoned");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::Deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_scopes_flow_mod_to_prev_rule_match_and_priority() {
        let transport = Arc::new(RecordingTransport::default());
        let store = RecordingStore::default();
        let clock = FixedClock(0);
        let mut prev_rule = sample_rule();
        prev_rule.priority = 42;
        let rule_id = prev_rule.rule_id;
        let expected = FlowMod::delete(rule_id.as_cookie(), 42, &prev_rule.match_spec);

        apply_action(transport.as_ref(), &store, &clock, prev_rule.dpid, ReconcileAction::Delete { rule_id, prev_rule })
            .await;

        let sent = transport.sent.lock().expect("mutex poisoned");
        assert_eq!(sent[0], expected.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn modify_waits_one_second_between_delete_and_install() {
        let transport = Arc::new(RecordingTransport::default());
        let store = RecordingStore::default();
        let clock = FixedClock(0);
        let prev_rule = sample_rule();
        let mut next_rule = prev_rule.clone();
        next_rule.actions = vec![Action::Normal];

        let start = tokio::time::Instant::now();
        let result = apply_action(
            transport.as_ref(),
            &store,
            &clock,
            prev_rule.dpid,
            ReconcileAction::Modify { prev_rule, next_rule },
        )
        .await;

        assert!(result.is_some());
        assert_eq!(transport.sent.lock().expect("mutex poisoned").len(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        let events = store.events.lock().expect("mutex poisoned");
        assert_eq!(events[0].kind, AuditKind::Modified);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_install_is_not_merged_into_cache() {
        let transport = Arc::new(RecordingTransport::default());
        *transport.fail_next.lock().expect("mutex poisoned") = true;
        let store = RecordingStore::default();
        let clock = FixedClock(0);
        let rule = sample_rule();

        let result =
            apply_action(transport.as_ref(), &store, &clock, rule.dpid, ReconcileAction::Install { rule }).await;

        assert!(result.is_none());
        let events = store.events.lock().expect("mutex poisoned");
        assert!(events[0].detail.is_some());
    }
}
