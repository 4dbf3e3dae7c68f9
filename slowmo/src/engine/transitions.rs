//! Event transition functions
//!
//! One function per structural event kind. Each turns a validated event into
//! the [`Decision`] describing its effect; the commit layer applies it.

use super::commit::{Decision, ParkedChange, StructureDelta};
use crate::events::{ContextSnapshot, Execute, Park, Ready, Schedule};
use crate::model::ParkedUnit;

/// The machine thread takes the context and enters the scheduler loop.
pub fn schedule(event: &Schedule) -> Decision {
    [
        StructureDelta::Bind { machine: event.machine, context: event.context },
        StructureDelta::Scheduling { machine: event.machine, scheduling: true },
        StructureDelta::Executing { machine: event.machine, unit: None },
    ]
    .into_iter()
    .collect()
}

/// The machine thread leaves the scheduler loop running `found`, with every
/// context's run queue as observed when the unit was picked.
pub fn execute(event: &Execute) -> Decision {
    let mut decision: Decision = [
        StructureDelta::Scheduling { machine: event.machine, scheduling: false },
        StructureDelta::Executing { machine: event.machine, unit: Some(event.found.clone()) },
    ]
    .into_iter()
    .collect();
    for snapshot in &event.snapshots {
        decision.push(context_state(snapshot));
    }
    decision
}

pub fn runq_status(snapshot: &ContextSnapshot) -> Decision {
    std::iter::once(context_state(snapshot)).collect()
}

pub fn park(event: &Park) -> Decision {
    [
        StructureDelta::Executing { machine: event.machine, unit: None },
        StructureDelta::Parked(ParkedChange::Added(ParkedUnit::new(
            event.unit.clone(),
            event.wait_reason.clone(),
        ))),
    ]
    .into_iter()
    .collect()
}

/// The unit leaves the parked registry for the run queue in `event.update`.
pub fn ready(event: &Ready) -> Decision {
    [context_state(&event.update), StructureDelta::Parked(ParkedChange::Removed(event.unit))]
        .into_iter()
        .collect()
}

fn context_state(snapshot: &ContextSnapshot) -> StructureDelta {
    StructureDelta::ContextState { machine: snapshot.machine, context: snapshot.context.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextId, MachineId, UnitId};
    use crate::model::{ExecutionUnit, ProcessingContext};
    use slowmo_common::ScheduleReason;

    #[test]
    fn test_schedule_binds_before_flagging_thread() {
        let decision = schedule(&Schedule {
            machine: MachineId(1),
            context: ContextId(1),
            reason: ScheduleReason::Mstart,
        });

        assert_eq!(
            decision.deltas(),
            &[
                StructureDelta::Bind { machine: MachineId(1), context: ContextId(1) },
                StructureDelta::Scheduling { machine: MachineId(1), scheduling: true },
                StructureDelta::Executing { machine: MachineId(1), unit: None },
            ]
        );
    }

    #[test]
    fn test_execute_bundles_every_snapshot() {
        let decision = execute(&Execute {
            machine: MachineId(2),
            context: ContextId(1),
            found: ExecutionUnit::new(1, "runtime.main"),
            snapshots: vec![
                ContextSnapshot { machine: None, context: ProcessingContext::idle(0) },
                ContextSnapshot { machine: Some(MachineId(2)), context: ProcessingContext::idle(1) },
            ],
        });

        assert_eq!(decision.len(), 4);
        assert!(matches!(
            decision.deltas()[3],
            StructureDelta::ContextState { machine: Some(MachineId(2)), .. }
        ));
    }

    #[test]
    fn test_ready_updates_queue_and_unparks() {
        let decision = ready(&Ready {
            unit: UnitId(1),
            update: ContextSnapshot {
                machine: Some(MachineId(0)),
                context: ProcessingContext::idle(0)
                    .with_run_queue(vec![ExecutionUnit::new(1, "runtime.main")]),
            },
        });

        assert_eq!(decision.len(), 2);
        assert_eq!(decision.deltas()[1], StructureDelta::Parked(ParkedChange::Removed(UnitId(1))));
    }
}
