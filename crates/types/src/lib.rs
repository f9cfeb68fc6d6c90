#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Shared types for relcheck
//!
//! Release version handling and the check/report model produced by a
//! verification run.

mod report;

pub use report::{Check, CheckStatus, Report};

/// A published release of the update stream.
///
/// Monotonically increasing, non-negative. Version 0 is the "from
/// nothing" base used by zero packs and never names a real release.
pub type ReleaseVersion = u32;

/// Minimum-version floor applied to a verification run.
///
/// Entries recorded below the floor are skipped; a floor of 0 means
/// every historical version reachable through the root index is
/// checked.
pub type VersionFloor = u32;
