//! Frame header state
//!
//! The resumable position of a frame is a plain integer (the suspension index)
//! plus the innermost active catch region and a lifecycle phase. Everything
//! else a frame needs lives in the body's storage cells, so this header is
//! small, `Copy`, and serializable for inspection and snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::protocol_violation;

/* ===================== Suspension index ===================== */

/// Identifies where a frame is parked
///
/// Zero always means "not yet started". Every other value is assigned by a
/// coroutine body to one of its suspension points or its return point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuspendIndex(u32);

impl SuspendIndex {
    pub const NOT_STARTED: Self = Self(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Abort on an index the body never assigned
    #[cold]
    #[track_caller]
    pub fn unknown(self, frame: &str) -> ! {
        protocol_violation(format_args!("{frame} has no suspension point {}", self.0))
    }
}

impl fmt::Display for SuspendIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/* ===================== Catch regions ===================== */

/// Names a protected region, as an index into the body's region table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(u32);

impl RegionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {}", self.0)
    }
}

/// Static description of one protected region
///
/// `scoped` lists the locals declared inside the region; they are destroyed
/// (when live) before the region's handler runs.
#[derive(Debug, Clone, Copy)]
pub struct Region<L: 'static> {
    pub parent: Option<RegionId>,
    pub scoped: &'static [L],
}

/* ===================== Lifecycle ===================== */

/// Where a frame is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Parked at `index`, resumable
    Suspended,

    /// Inside the step function
    Running,

    /// Finished and parked at the final awaiter
    FinalSuspended,

    /// Finished and torn down; only memory release remains
    Finalized,

    /// Torn down by an explicit destroy
    Destroyed,
}

/// The frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameState {
    pub index: SuspendIndex,
    pub region: Option<RegionId>,
    pub phase: Phase,
}

impl FrameState {
    pub const fn new() -> Self {
        Self {
            index: SuspendIndex::NOT_STARTED,
            region: None,
            phase: Phase::Suspended,
        }
    }

    /// True once the body produced its final result (normally or by failure)
    pub fn is_done(&self) -> bool {
        matches!(
            self.phase,
            Phase::FinalSuspended | Phase::Finalized | Phase::Destroyed
        )
    }

    /// True once nothing but memory release remains
    pub fn is_torn_down(&self) -> bool {
        matches!(self.phase, Phase::Finalized | Phase::Destroyed)
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new()
    }
}
