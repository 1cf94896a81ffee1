// crates/flowctl-core/src/registry.rs
// ============================================================================
// Module: Flowctl Switch Registry
// Description: In-memory bookkeeping of connected switches and their
//   installed-flow cache.
// Purpose: Give the monitor loop a single place to track "what is connected"
//   and "what do we believe is installed", without itself doing any I/O or
//   locking (callers own synchronization).
// Dependencies: none beyond flowctl-core's own model
// ============================================================================

//! ## Overview
//! `SwitchRegistry` is a plain, non-thread-safe struct. `flowctl-monitor`
//! wraps it (together with whatever cache it needs) in a single mutex, per
//! the concurrency model: one lock guards both registry and cache, held
//! only across non-suspending operations.

use std::collections::HashMap;

use crate::identifiers::DatapathId;
use crate::model::InstalledMap;
use crate::model::SwitchSession;

// ============================================================================
// SECTION: SwitchRegistry
// ============================================================================

/// Tracks connected switches and each one's installed-flow cache.
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    /// Currently connected switches, keyed by dpid.
    sessions: HashMap<DatapathId, SwitchSession>,
    /// Each connected switch's installed-flow cache, keyed by dpid.
    installed: HashMap<DatapathId, InstalledMap>,
}

impl SwitchRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a switch connection, replacing any prior session for the
    /// same dpid and bumping its generation counter.
    ///
    /// Returns the new session's generation.
    pub fn register(&mut self, dpid: DatapathId) -> u64 {
        let generation = self.sessions.get(&dpid).map_or(0, |s| s.generation + 1);
        self.sessions.insert(dpid, SwitchSession { dpid, generation });
        self.installed.entry(dpid).or_default();
        generation
    }

    /// Removes a switch's session and installed-flow cache.
    pub fn unregister(&mut self, dpid: DatapathId) {
        self.sessions.remove(&dpid);
        self.installed.remove(&dpid);
    }

    /// Returns the current session for a dpid, if connected.
    #[must_use]
    pub fn session(&self, dpid: DatapathId) -> Option<&SwitchSession> {
        self.sessions.get(&dpid)
    }

    /// Returns the dpids of all currently connected switches.
    pub fn connected_dpids(&self) -> impl Iterator<Item = DatapathId> + '_ {
        self.sessions.keys().copied()
    }

    /// Returns `true` when `generation` matches the switch's current
    /// session generation, meaning an in-flight operation started against
    /// that generation is still valid.
    #[must_use]
    pub fn is_current_generation(&self, dpid: DatapathId, generation: u64) -> bool {
        self.sessions.get(&dpid).is_some_and(|s| s.generation == generation)
    }

    /// Returns the installed-flow cache for a switch, if connected.
    #[must_use]
    pub fn installed(&self, dpid: DatapathId) -> Option<&InstalledMap> {
        self.installed.get(&dpid)
    }

    /// Replaces a switch's installed-flow cache wholesale.
    ///
    /// Matches the legacy monitor loop, which replaces its entire
    /// `db_rules` cache after each reconciliation pass regardless of
    /// whether individual actions within the pass succeeded.
    pub fn set_installed(&mut self, dpid: DatapathId, installed: InstalledMap) {
        self.installed.insert(dpid, installed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_clears_state() {
        let mut registry = SwitchRegistry::new();
        let dpid = DatapathId::new(1);
        registry.register(dpid);
        assert!(registry.session(dpid).is_some());
        registry.unregister(dpid);
        assert!(registry.session(dpid).is_none());
        assert!(registry.installed(dpid).is_none());
    }

    #[test]
    fn reconnect_bumps_generation() {
        let mut registry = SwitchRegistry::new();
        let dpid = DatapathId::new(1);
        let first = registry.register(dpid);
        let second = registry.register(dpid);
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert!(registry.is_current_generation(dpid, 1));
        assert!(!registry.is_current_generation(dpid, 0));
    }

    #[test]
    fn set_installed_replaces_cache_wholesale() {
        let mut registry = SwitchRegistry::new();
        let dpid = DatapathId::new(1);
        registry.register(dpid);
        registry.set_installed(dpid, InstalledMap::new());
        assert_eq!(registry.installed(dpid).map(InstalledMap::len), Some(0));
    }

    #[test]
    fn unknown_dpid_has_no_generation_match() {
        let registry = SwitchRegistry::new();
        assert!(!registry.is_current_generation(DatapathId::new(99), 0));
    }
}
