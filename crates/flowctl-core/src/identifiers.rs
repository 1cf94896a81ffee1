// crates/flowctl-core/src/identifiers.rs
// ============================================================================
// Module: Flowctl Identifiers
// Description: Canonical identifiers for datapaths and rules.
// Purpose: Provide strongly typed identifiers with validated wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers used throughout flowctl. `RuleId` enforces the positive,
//! 63-bit range required so a rule id can always be carried verbatim as an
//! OpenFlow cookie (spec open question: cookie overflow).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: DatapathId
// ============================================================================

/// Identifier of a connected OpenFlow switch.
///
/// # Invariants
/// - Opaque 64-bit value assigned by the switch; no range restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(u64);

impl DatapathId {
    /// Creates a datapath identifier from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for DatapathId {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

// ============================================================================
// SECTION: RuleId
// ============================================================================

/// Error returned when a raw value cannot be represented as a [`RuleId`].
///
/// # Invariants
/// - Produced only by [`RuleId::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rule_id {0} is out of range (must be in 1..=i64::MAX)")]
pub struct RuleIdRangeError(pub u64);

/// Globally unique rule identifier.
///
/// # Invariants
/// - Always in `1..=i64::MAX as u64` (the positive 63-bit range), so the
///   value can be carried verbatim as a 64-bit OpenFlow cookie without
///   overflow or sign ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(u64);

impl RuleId {
    /// Maximum representable rule id (the positive 63-bit range, i.e.
    /// `i64::MAX`, spelled as a `u64` literal to avoid a sign-changing cast).
    pub const MAX: u64 = 0x7FFF_FFFF_FFFF_FFFF;

    /// Creates a rule identifier from a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`RuleIdRangeError`] when `raw` is zero or exceeds
    /// [`RuleId::MAX`].
    pub const fn from_raw(raw: u64) -> Result<Self, RuleIdRangeError> {
        if raw == 0 || raw > Self::MAX {
            Err(RuleIdRangeError(raw))
        } else {
            Ok(Self(raw))
        }
    }

    /// Returns the raw identifier value (always in `1..=RuleId::MAX`).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the value as an OpenFlow cookie.
    #[must_use]
    pub const fn as_cookie(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u64> for RuleId {
    type Error = RuleIdRangeError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
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
    fn rule_id_rejects_zero() {
        assert!(RuleId::from_raw(0).is_err());
    }

    #[test]
    fn rule_id_rejects_above_max() {
        assert!(RuleId::from_raw(u64::from(u32::MAX) << 40).is_err());
    }

    #[test]
    fn rule_id_accepts_in_range() {
        let id = RuleId::from_raw(5).expect("5 is in range");
        assert_eq!(id.get(), 5);
        assert_eq!(id.as_cookie(), 5);
    }

    #[test]
    fn datapath_id_roundtrips() {
        let dpid = DatapathId::from(7);
        assert_eq!(dpid.get(), 7);
        assert_eq!(dpid.to_string(), "7");
    }
}
