//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent mixing up the three id spaces of the
//! scheduler (machine threads, processing contexts, execution units), which
//! all travel as plain integers on the wire.

use serde::Serialize;
use std::fmt;

/// Machine thread id (M)
///
/// Kept at full 64-bit width; ids handed out by the runtime are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MachineId(pub u64);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Processing context id (P)
///
/// Contexts are indexed `0..width`, so 32 bits are enough. Conversion from the
/// 64-bit wire value is checked, never truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl TryFrom<u64> for ContextId {
    type Error = std::num::TryFromIntError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        u32::try_from(raw).map(ContextId)
    }
}

/// Execution unit id (G)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Where an execution unit currently lives in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLocation {
    /// Running on the thread at this position of the thread list
    Executing { thread: usize },
    RunNext(ContextId),
    RunQueue(ContextId),
    Parked,
}

impl fmt::Display for UnitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitLocation::Executing { thread } => write!(f, "executing on thread #{thread}"),
            UnitLocation::RunNext(context) => write!(f, "runnext of {context}"),
            UnitLocation::RunQueue(context) => write!(f, "run queue of {context}"),
            UnitLocation::Parked => write!(f, "parked registry"),
        }
    }
}
