// crates/flowctl-monitor/src/monitor.rs
// ============================================================================
// Module: Flowctl Monitor Loop
// Description: The periodic reconciliation loop: snapshot desired state for
//   every switch the store knows about, diff each against the previous
//   pass's cache, program the difference for connected switches, and
//   replace the desired-state cache wholesale.
// Purpose: Drive every switch, connected or not, toward its desired
//   state on a fixed interval, shutting down cleanly on signal.
// Dependencies: flowctl-core, tokio (select, sleep, watch), tracing
// ============================================================================

//! ## Overview
//! One call to [`run_once`] reconciles every dpid the store currently has
//! rules for, plus every dpid still present in the cache from a previous
//! pass (so a rule set deleted from the store entirely still produces a
//! final `Delete` pass). [`run`] calls it on a fixed interval until a
//! `tokio::sync::watch` shutdown signal fires, using `tokio::select!` so a
//! pending sleep never delays shutdown.
//!
//! A disconnected dpid is still diffed: its cache entry must track what
//! the store desires, or a reconnect would see a stale baseline, but no
//! FLOW_MOD is sent for it; the programmer only runs for dpids the
//! registry currently considers connected. The cache is replaced wholesale
//! at the end of every pass regardless of whether individual actions
//! succeeded, matching the legacy monitor loop's cache semantics.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::time::Duration;

use flowctl_core::diff::diff;
use flowctl_core::diff::ReconcileAction;
use flowctl_core::interfaces::RuleStore;
use flowctl_core::interfaces::SwitchTransport;
use flowctl_core::DatapathId;
use flowctl_core::DesiredState;
use flowctl_core::InstalledMap;
use tokio::sync::watch;

use crate::clock::Clock;
use crate::programmer::apply_action;
use crate::shared::Shared;

/// Runs one reconciliation pass across every dpid known to `store` or
/// still present in the desired-state cache.
///
/// Loads the store's full desired-state snapshot once, diffs each dpid
/// against the cache's previous snapshot for that dpid, programs the
/// resulting actions for connected switches, and replaces the cache
/// wholesale with the freshly loaded snapshot.
pub async fn run_once<T, S, C>(shared: &Shared, transport: &T, store: &S, clock: &C)
where
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    let next_map: BTreeMap<DatapathId, DesiredState> = match store.load_all_desired_state().await {
        Ok(rows) => rows.into_iter().collect(),
        Err(err) => {
            tracing::error!(%err, "failed to load desired state; skipping this pass");
            return;
        }
    };

    let prev_map = shared.cache_snapshot();
    let connected: HashSet<DatapathId> = shared.connected_dpids().into_iter().collect();

    let mut dpids: Vec<DatapathId> = prev_map.keys().chain(next_map.keys()).copied().collect();
    dpids.sort_unstable();
    dpids.dedup();

    for dpid in dpids {
        let prev = prev_map.get(&dpid).cloned().unwrap_or_default();
        let next = next_map.get(&dpid).cloned().unwrap_or_default();
        let actions = diff(&prev, &next);

        if actions.is_empty() {
            continue;
        }

        if !connected.contains(&dpid) {
            tracing::warn!(%dpid, "switch not connected; desired state changed but cannot be programmed this pass");
            continue;
        }

        reconcile_connected(shared, transport, store, clock, dpid, actions).await;
    }

    shared.replace_cache_wholesale(next_map);
}

async fn reconcile_connected<T, S, C>(
    shared: &Shared,
    transport: &T,
    store: &S,
    clock: &C,
    dpid: DatapathId,
    actions: Vec<ReconcileAction>,
) where
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    let mut next_installed: InstalledMap = shared.installed_snapshot(dpid).unwrap_or_default();

    for action in actions {
        let rule_id = action.rule_id();
        match apply_action(transport, store, clock, dpid, action).await {
            Some(flow) => {
                next_installed.insert(rule_id, flow);
            }
            None => {
                next_installed.remove(&rule_id);
            }
        }
    }

    shared.set_installed(dpid, next_installed);
}

/// Runs the reconciliation loop on a fixed interval until `shutdown` fires.
///
/// `shutdown` is a `tokio::sync::watch::Receiver<bool>`; the loop exits
/// once its value becomes `true`.
pub async fn run<T, S, C>(
    shared: Shared,
    transport: T,
    store: S,
    clock: C,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    T: SwitchTransport,
    S: RuleStore,
    C: Clock,
{
    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {
                run_once(&shared, &transport, &store, &clock).await;
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    tracing::info!("monitor loop shutting down");
                    return;
                }
            }
        }
    }
}
