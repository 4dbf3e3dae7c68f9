//! # Structure-Update Commit Layer
//!
//! One scheduling decision often touches several structures at once: an
//! execute decision assigns the running unit *and* rewrites the run queue of
//! every context it looked at. Transitions therefore describe their effect as
//! a [`Decision`], an ordered list of [`StructureDelta`]s, and this layer
//! applies the whole list to a staged copy of the model in one pass.
//!
//! The staged copy only replaces the published model once every delta applied
//! cleanly and the invariants hold, so observers never see a unit assigned to a
//! thread while the run queue it came from is still stale.

use serde::Serialize;

use super::invariants;
use super::rebind::{rebind, release};
use crate::domain::{ContextId, InvariantViolation, MachineId, UnitId};
use crate::model::{ExecutionUnit, Model, ParkedUnit, ProcessingContext, Thread};

/// A single change to one scheduler structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureDelta {
    /// Machine thread entered or left the scheduler loop
    Scheduling { machine: MachineId, scheduling: bool },
    /// Machine thread's running unit changed (`None` clears it)
    Executing { machine: MachineId, unit: Option<ExecutionUnit> },
    /// Machine thread takes over a context as it currently is
    Bind { machine: MachineId, context: ContextId },
    /// Full observed state of a context, bound to `machine` or unclaimed
    ContextState { machine: Option<MachineId>, context: ProcessingContext },
    /// Parked registry change
    Parked(ParkedChange),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParkedChange {
    Added(ParkedUnit),
    Removed(UnitId),
}

impl StructureDelta {
    fn machine(&self) -> Option<MachineId> {
        match self {
            StructureDelta::Scheduling { machine, .. }
            | StructureDelta::Executing { machine, .. }
            | StructureDelta::Bind { machine, .. } => Some(*machine),
            StructureDelta::ContextState { machine, .. } => *machine,
            StructureDelta::Parked(_) => None,
        }
    }
}

/// All deltas belonging to one scheduling decision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    deltas: Vec<StructureDelta>,
}

impl Decision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: StructureDelta) -> &mut Self {
        self.deltas.push(delta);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn deltas(&self) -> &[StructureDelta] {
        &self.deltas
    }
}

impl FromIterator<StructureDelta> for Decision {
    fn from_iter<I: IntoIterator<Item = StructureDelta>>(iter: I) -> Self {
        Self { deltas: iter.into_iter().collect() }
    }
}

/// Which parts of the model a committed decision changed
///
/// Lets a renderer redraw only what moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub threads: bool,
    pub parked: bool,
    /// Machine threads named by the decision, ascending
    pub machines: Vec<MachineId>,
}

impl ChangeSet {
    fn record(&mut self, delta: &StructureDelta) {
        match delta {
            StructureDelta::Parked(_) => self.parked = true,
            _ => self.threads = true,
        }
        if let Some(machine) = delta.machine() {
            if let Err(slot) = self.machines.binary_search(&machine) {
                self.machines.insert(slot, machine);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.threads && !self.parked
    }
}

/// Apply `decision` to a staged copy of `model`.
///
/// Returns the new model and what changed; `model` itself is never touched.
///
/// # Errors
///
/// Fails if a delta names an unknown machine, context or parked unit, or if
/// the staged model breaks a structural invariant.
pub fn apply(model: &Model, decision: &Decision) -> Result<(Model, ChangeSet), InvariantViolation> {
    let mut threads = model.threads.clone();
    let mut parked = model.parked.clone();
    let mut changes = ChangeSet::default();

    for delta in &decision.deltas {
        changes.record(delta);
        match delta {
            StructureDelta::Scheduling { machine, scheduling } => {
                thread_mut(&mut threads, *machine)?.is_scheduling = *scheduling;
            }
            StructureDelta::Executing { machine, unit } => {
                thread_mut(&mut threads, *machine)?.executing.clone_from(unit);
            }
            StructureDelta::Bind { machine, context } => {
                threads = rebind(threads, *machine, *context, None)?;
            }
            StructureDelta::ContextState { machine: Some(machine), context } => {
                threads = rebind(threads, *machine, context.id, Some(context.clone()))?;
            }
            StructureDelta::ContextState { machine: None, context } => {
                threads = release(threads, context.id, context.clone())?;
            }
            StructureDelta::Parked(ParkedChange::Added(unit)) => parked.push(unit.clone()),
            StructureDelta::Parked(ParkedChange::Removed(unit)) => {
                let index = parked
                    .iter()
                    .position(|entry| entry.unit.id == *unit)
                    .ok_or(InvariantViolation::UnitNotParked(*unit))?;
                parked.remove(index);
            }
        }
    }

    let staged = Model { threads, parked };
    invariants::check(&staged)?;
    Ok((staged, changes))
}

fn thread_mut(threads: &mut [Thread], machine: MachineId) -> Result<&mut Thread, InvariantViolation> {
    threads
        .iter_mut()
        .find(|thread| thread.machine_id == Some(machine))
        .ok_or(InvariantViolation::UnknownMachine(machine))
}
