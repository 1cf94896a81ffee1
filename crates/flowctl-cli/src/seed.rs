// crates/flowctl-cli/src/seed.rs
// ============================================================================
// Module: Rule Seeding
// Description: Loads a JSON rule file and writes it into the rule store for
//   a given switch, for local exercising and testing.
// Purpose: Give an operator a way to populate desired state without a
//   separate CRUD editor, matching the legacy system's database-first
//   workflow.
// Dependencies: flowctl-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Expects a JSON array of objects shaped like:
//! `{"rule_id": 1, "priority": 10, "match": {...}, "actions": [...]}`.
//! `match` and `actions` use the same field names as [`flowctl_core::MatchSpec`]
//! and [`flowctl_core::Action`].

use flowctl_core::DatapathId;
use flowctl_core::RuleId;
use serde::Deserialize;

/// Error loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The seed file could not be read.
    #[error("failed to read seed file: {0}")]
    Read(#[source] std::io::Error),
    /// The seed file was not valid JSON for the expected shape.
    #[error("failed to parse seed file: {0}")]
    Parse(#[source] serde_json::Error),
    /// A seed entry's `rule_id` was out of range.
    #[error("invalid rule id in seed file: {0}")]
    InvalidRuleId(#[from] flowctl_core::RuleIdRangeError),
}

#[derive(Debug, Deserialize)]
struct SeedRule {
    /// Raw rule identifier, range-checked during conversion to [`RuleId`].
    rule_id: u64,
    /// Flow table priority.
    priority: u16,
    /// Match criteria.
    #[serde(rename = "match")]
    match_spec: flowctl_core::MatchSpec,
    /// Actions to apply on match.
    actions: Vec<flowctl_core::Action>,
}

/// Loads rules for `dpid` from a JSON file at `path`.
///
/// # Errors
///
/// Returns [`SeedError`] if the file cannot be read, is not valid JSON, or
/// contains an out-of-range rule id.
pub fn load_seed_file(path: &std::path::Path, dpid: DatapathId) -> Result<Vec<flowctl_core::Rule>, SeedError> {
    let text = std::fs::read_to_string(path).map_err(SeedError::Read)?;
    let entries: Vec<SeedRule> = serde_json::from_str(&text).map_err(SeedError::Parse)?;
    entries
        .into_iter()
        .map(|entry| {
            Ok(flowctl_core::Rule {
                rule_id: RuleId::from_raw(entry.rule_id)?,
                dpid,
                match_spec: entry.match_spec,
                priority: entry.priority,
                actions: entry.actions,
            })
        })
        .collect()
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
    fn loads_well_formed_seed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"[{"rule_id": 1, "priority": 10, "match": {}, "actions": [{"type": "DROP"}]}]"#,
        )
        .expect("writes");

        let rules = load_seed_file(&path, DatapathId::new(1)).expect("loads");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id.get(), 1);
    }

    #[test]
    fn rejects_invalid_rule_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rules.json");
        std::fs::write(&path, r#"[{"rule_id": 0, "priority": 1, "match": {}, "actions": []}]"#)
            .expect("writes");

        assert!(matches!(load_seed_file(&path, DatapathId::new(1)), Err(SeedError::InvalidRuleId(_))));
    }
}
