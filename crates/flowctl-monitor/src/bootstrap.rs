// crates/flowctl-monitor/src/bootstrap.rs
// ============================================================================
// Module: Flowctl Session Bootstrap
// Description: Reacts to switch connection events: registers/unregisters
//   sessions and performs a new switch's initial flow programming.
// Purpose: Implement the legacy `switch_features_handler` behavior:
//   install the table-miss flow, then either the rules already on file for
//   this dpid or the normal-forwarding fallback.
// Dependencies: flowctl-core, tracing
// ============================================================================

//! ## Overview
//! On [`ConnectEvent::FeaturesReplied`]: register the switch (bumping its
//! generation), install the table-miss flow (priority 0, wildcard match,
//! `OFPP_CONTROLLER`, cookie 0), then load that dpid's desired rules from
//! the store. If none exist, install the normal-forwarding fallback
//! (priority 1, wildcard match, `OFPP_NORMAL`, cookie 0); otherwise install
//! each rule and audit it as `INSTALADA`. The loaded desired state is also
//! merged into the monitor loop's desired-state cache, so its next pass
//! diffs against what was just installed rather than re-installing it. On
//! [`ConnectEvent::Disconnected`], unregister the switch so the monitor
//! loop stops reconciling it.

use flowctl_core::codec::encode_audit;
use flowctl_core::interfaces::RuleStore;
use flowctl_core::interfaces::SwitchEventSource;
use flowctl_core::interfaces::SwitchTransport;
use flowctl_core::AuditKind;
use flowctl_core::DatapathId;
use flowctl_core::FlowMod;
use flowctl_core::InstalledFlow;
use flowctl_core::InstalledMap;

use crate::clock::Clock;
use crate::shared::Shared;

/// Handles one [`ConnectEvent`], mutating `shared` and programming the
/// switch's initial flows as needed.
pub async fn handle_event<T, S, C>(
    shared: &Shared,
    transport: &T,
    store: &S,
    clock: &C,
    event: flowctl_core::interfaces::ConnectEvent,
) where
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    match event {
        flowctl_core::interfaces::ConnectEvent::FeaturesReplied { dpid } => {
            let generation = shared.register(dpid);
            bootstrap_switch(shared, transport, store, clock, dpid, generation).await;
        }
        flowctl_core::interfaces::ConnectEvent::Disconnected { dpid } => {
            shared.unregister(dpid);
        }
    }
}

/// Bootstraps one switch's initial flows.
///
/// `generation` is the session generation [`handle_event`] observed at
/// registration time. Before writing the final installed/cache state, this
/// is checked against the registry's current generation for `dpid`: if the
/// switch disconnected and reconnected while this bootstrap was still
/// sending flows, a newer [`bootstrap_switch`] call owns that dpid's state
/// and this stale one must not clobber it.
async fn bootstrap_switch<T, S, C>(
    shared: &Shared,
    transport: &T,
    store: &S,
    clock: &C,
    dpid: DatapathId,
    generation: u64,
)
where
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    let miss_flow = FlowMod::table_miss();
    if let Err(err) = transport.send_flow_mod(dpid, miss_flow.as_bytes()).await {
        tracing::error!(%dpid, %err, "failed to install table-miss flow");
    }

    let desired = match store.load_desired_state(dpid).await {
        Ok(desired) => desired,
        Err(err) => {
            tracing::error!(%dpid, %err, "failed to load initial rules; leaving cache empty");
            if shared.is_current_generation(dpid, generation) {
                shared.set_installed(dpid, InstalledMap::new());
            }
            return;
        }
    };

    let mut installed = InstalledMap::new();

    if desired.is_empty() {
        let fallback = FlowMod::normal_fallback();
        if let Err(err) = transport.send_flow_mod(dpid, fallback.as_bytes()).await {
            tracing::error!(%dpid, %err, "failed to install normal-forwarding fallback");
        }
    } else {
        for rule in desired.values() {
            let message = FlowMod::add(rule.rule_id.as_cookie(), rule.priority, &rule.match_spec, &rule.actions);
            let detail = match transport.send_flow_mod(dpid, message.as_bytes()).await {
                Ok(()) => {
                    installed.insert(rule.rule_id, InstalledFlow::from(rule));
                    None
                }
                Err(err) => {
                    tracing::warn!(%dpid, rule_id = %rule.rule_id, %err, "initial flow install failed");
                    Some(err.to_string())
                }
            };
            let event = encode_audit(rule, AuditKind::Installed, clock.now_millis(), detail);
            if let Err(err) = store.append_audit_event(&event).await {
                tracing::error!(%dpid, %err, "failed to append audit event");
            }
        }
    }

    if shared.is_current_generation(dpid, generation) {
        shared.set_installed(dpid, installed);
        shared.set_cache(dpid, desired);
    } else {
        tracing::info!(%dpid, "bootstrap superseded by a newer connection; discarding its result");
    }
}

/// Consumes events from `events` until it closes, handling each in turn.
///
/// Intended to be spawned as its own task; returns once `events` reports
/// [`flowctl_core::interfaces::EventSourceError::Closed`].
pub async fn run<E, T, S, C>(mut events: E, shared: Shared, transport: T, store: S, clock: C)
where
    E: SwitchEventSource,
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    loop {
        match events.next_event().await {
            Ok(event) => handle_event(&shared, &transport, &store, &clock, event).await,
            Err(flowctl_core::interfaces::EventSourceError::Closed) => {
                tracing::info!("switch event source closed; bootstrap task exiting");
                return;
            }
            Err(err) => {
                tracing::error!(%err, "switch event source error");
            }
        }
    }
}
