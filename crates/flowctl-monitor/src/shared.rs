// crates/flowctl-monitor/src/shared.rs
// ============================================================================
// Module: Flowctl Shared State
// Description: The single mutex guarding the switch registry and the
//   monitor loop's desired-state cache, shared across the monitor loop and
//   session bootstrap.
// Purpose: Enforce the concurrency model: one lock, acquired only outside
//   suspension points.
// Dependencies: none beyond flowctl-core and std::sync
// ============================================================================

//! ## Overview
//! `Shared` wraps a [`SwitchRegistry`] and the monitor loop's desired-state
//! cache in one `std::sync::Mutex`, not a `tokio::sync::Mutex`. The lock is
//! always acquired, used for a synchronous read or mutation, and released
//! before any `.await` (callers never hold it across a suspension point).
//! This keeps lock hold times short and rules out the deadlock class that
//! an awaited-while-held async mutex would invite.
//!
//! The cache is distinct from the registry's installed-flow map: the cache
//! records what the monitor loop last *asked for* (its previous diff
//! input), while the installed map records what the programmer last
//! confirmed sending. A dpid can be present in one without the other:
//! e.g. a disconnected switch still has a cache entry but no installed map.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use flowctl_core::DatapathId;
use flowctl_core::DesiredState;
use flowctl_core::InstalledMap;
use flowctl_core::SwitchRegistry;

#[derive(Default)]
struct SharedState {
    /// Connected switches and their installed-flow caches.
    registry: SwitchRegistry,
    /// The monitor loop's previous-pass desired-state snapshot, per dpid.
    cache: BTreeMap<DatapathId, DesiredState>,
}

/// Shared, lock-protected registry and cache handle.
///
/// Cheap to clone: cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct Shared {
    /// The lock-protected registry and cache.
    state: Arc<Mutex<SharedState>>,
}

impl Shared {
    /// Creates a new, empty shared state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Registers a switch connection and returns its session generation.
    pub fn register(&self, dpid: DatapathId) -> u64 {
        self.guard().registry.register(dpid)
    }

    /// Removes a switch's session and installed-flow cache. The
    /// desired-state cache is left untouched: a disconnected switch's last
    /// known desired state is still the correct diff baseline if it
    /// reconnects before its next reconciliation pass.
    pub fn unregister(&self, dpid: DatapathId) {
        self.guard().registry.unregister(dpid);
    }

    /// Returns the dpids of all currently connected switches.
    #[must_use]
    pub fn connected_dpids(&self) -> Vec<DatapathId> {
        self.guard().registry.connected_dpids().collect()
    }

    /// Returns `true` if `generation` is still the switch's current
    /// connection generation.
    #[must_use]
    pub fn is_current_generation(&self, dpid: DatapathId, generation: u64) -> bool {
        self.guard().registry.is_current_generation(dpid, generation)
    }

    /// Returns a clone of a switch's installed-flow cache, if connected.
    #[must_use]
    pub fn installed_snapshot(&self, dpid: DatapathId) -> Option<InstalledMap> {
        self.guard().registry.installed(dpid).cloned()
    }

    /// Replaces a switch's installed-flow cache wholesale.
    pub fn set_installed(&self, dpid: DatapathId, installed: InstalledMap) {
        self.guard().registry.set_installed(dpid, installed);
    }

    /// Returns a clone of the full desired-state cache, keyed by dpid.
    ///
    /// Used by the monitor loop to compute this pass's diff baseline
    /// before replacing the cache wholesale with the store's freshly
    /// loaded snapshot.
    #[must_use]
    pub fn cache_snapshot(&self) -> BTreeMap<DatapathId, DesiredState> {
        self.guard().cache.clone()
    }

    /// Merges one dpid's desired state into the cache, leaving every other
    /// dpid's entry untouched.
    ///
    /// Used by session bootstrap after loading a newly connected switch's
    /// initial rules, so the monitor loop's next pass sees no diff for
    /// rules that were just installed.
    pub fn set_cache(&self, dpid: DatapathId, desired: DesiredState) {
        self.guard().cache.insert(dpid, desired);
    }

    /// Replaces the entire desired-state cache, discarding any dpid not
    /// present in `next`.
    ///
    /// Called once at the end of a monitor pass, regardless of whether
    /// individual reconciliation actions within the pass succeeded. The
    /// cache tracks what was last asked for, not what was confirmed
    /// installed.
    pub fn replace_cache_wholesale(&self, next: BTreeMap<DatapathId, DesiredState>) {
        self.guard().cache = next;
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

    #[test]
    fn register_and_snapshot_roundtrip() {
        let shared = Shared::new();
        let dpid = DatapathId::new(1);
        shared.register(dpid);
        shared.set_installed(dpid, InstalledMap::new());
        assert_eq!(shared.installed_snapshot(dpid), Some(InstalledMap::new()));
    }

    #[test]
    fn unregister_clears_installed_snapshot() {
        let shared = Shared::new();
        let dpid = DatapathId::new(1);
        shared.register(dpid);
        shared.unregister(dpid);
        assert_eq!(shared.installed_snapshot(dpid), None);
    }

    #[test]
    fn unregister_preserves_desired_state_cache() {
        let shared = Shared::new();
        let dpid = DatapathId::new(1);
        shared.register(dpid);
        shared.set_cache(dpid, DesiredState::new());
        shared.unregister(dpid);
        assert!(shared.cache_snapshot().contains_key(&dpid));
    }

    #[test]
    fn set_cache_merges_without_disturbing_other_dpids() {
        let shared = Shared::new();
        let a = DatapathId::new(1);
        let b = DatapathId::new(2);
        shared.set_cache(a, DesiredState::new());
        shared.set_cache(b, DesiredState::new());
        let snapshot = shared.cache_snapshot();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn replace_cache_wholesale_drops_missing_dpids() {
        let shared = Shared::new();
        let a = DatapathId::new(1);
        let b = DatapathId::new(2);
        shared.set_cache(a, DesiredState::new());
        let mut next = BTreeMap::new();
        next.insert(b, DesiredState::new());
        shared.replace_cache_wholesale(next);
        let snapshot = shared.cache_snapshot();
        assert!(!snapshot.contains_key(&a));
        assert!(snapshot.contains_key(&b));
    }
}
