// crates/flowctl-monitor/src/lib.rs
// ============================================================================
// Crate: flowctl-monitor
// Description: The concurrent reconciliation activity: session bootstrap,
//   flow programming, and the periodic monitor loop.
// ============================================================================

//! # flowctl-monitor
//!
//! Drives connected switches toward their desired flow state. Bootstraps a
//! newly connected switch's initial flows ([`bootstrap`]), programs
//! individual reconciliation actions with the legacy retry/settle timing
//! ([`programmer`]), and runs the fixed-interval reconciliation loop
//! ([`monitor`]) over state shared with bootstrap through [`shared::Shared`].

#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod clock;
pub mod monitor;
pub mod programmer;
pub mod shared;

pub use clock::Clock;
pub use clock::SystemClock;
pub use shared::Shared;
