//! Identity-stable entity enumeration
//!
//! An [`EntityEnumeration`] owns an ordered set of instances keyed by a stable
//! identity string and keeps that set synchronized with snapshots produced by a
//! [`ResourceProbe`]. Each resource domain (network interfaces, logical disks,
//! ...) plugs in through an [`EnumerationAdapter`] that extracts identities,
//! decides which newly observed records are admitted, and builds or refreshes
//! its instances.
//!
//! Two update paths exist:
//! - full synchronization (`update(false)` / `init()`): adds, removes and
//!   refreshes so the set matches the filtered latest snapshot exactly
//! - cheap refresh (`update(true)`): refreshes existing instances only, never
//!   changes membership
//!
//! Instances that persist across cycles are refreshed in place, so any state
//! they accumulate (previous counter values, timestamps) survives.

pub mod engine;
pub mod traits;

pub use engine::{EntityEnumeration, SyncSummary};
pub use traits::{EnumerationAdapter, ResourceProbe};
