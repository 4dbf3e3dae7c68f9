//! Structural invariants checked on every staged model before it is committed
//!
//! - a context is bound to at most one thread entry
//! - a machine id appears in at most one thread entry
//! - a unit lives in exactly one place (executing, runnext, run queue, parked)
//! - no thread entry is dead (neither machine nor context)
//!
//! Thread ordering is not checked here; reconciliation only ever updates in
//! place, appends, or prunes.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::domain::{InvariantViolation, UnitId, UnitLocation};
use crate::model::Model;

/// Verify the structural invariants of `model`.
///
/// # Errors
///
/// Returns the first violation found.
pub fn check(model: &Model) -> Result<(), InvariantViolation> {
    let mut contexts = HashSet::new();
    let mut machines = HashSet::new();

    for (index, thread) in model.threads.iter().enumerate() {
        if thread.is_dead() {
            return Err(InvariantViolation::DeadPlaceholder { index });
        }
        if let Some(machine) = thread.machine_id {
            if !machines.insert(machine) {
                return Err(InvariantViolation::DuplicateMachine(machine));
            }
        }
        if let Some(context) = thread.context_id() {
            if !contexts.insert(context) {
                return Err(InvariantViolation::DuplicateContext(context));
            }
        }
    }

    let mut seen: HashMap<UnitId, UnitLocation> = HashMap::new();
    for (unit, location) in model.unit_locations() {
        if let Some(&first) = seen.get(&unit) {
            return Err(InvariantViolation::DuplicateUnit { unit, first, second: location });
        }
        seen.insert(unit, location);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextId, MachineId};
    use crate::model::{ExecutionUnit, ParkedUnit, ProcessingContext, Thread};

    #[test]
    fn test_seeded_model_is_consistent() {
        assert_eq!(check(&Model::seeded(4)), Ok(()));
        assert_eq!(check(&Model::default()), Ok(()));
    }

    #[test]
    fn test_duplicate_context_detected() {
        let model = Model {
            threads: vec![
                Thread::machine(0).with_context(ProcessingContext::idle(1)),
                Thread::unclaimed(ProcessingContext::idle(1)),
            ],
            parked: Vec::new(),
        };
        assert_eq!(check(&model), Err(InvariantViolation::DuplicateContext(ContextId(1))));
    }

    #[test]
    fn test_duplicate_machine_detected() {
        let model = Model {
            threads: vec![Thread::machine(2), Thread::machine(2)],
            parked: Vec::new(),
        };
        assert_eq!(check(&model), Err(InvariantViolation::DuplicateMachine(MachineId(2))));
    }

    #[test]
    fn test_dead_placeholder_detected() {
        let model = Model { threads: vec![Thread::machine(0), Thread::default()], parked: vec![] };
        assert_eq!(check(&model), Err(InvariantViolation::DeadPlaceholder { index: 1 }));
    }

    #[test]
    fn test_unit_in_run_queue_and_parked_detected() {
        let model = Model {
            threads: vec![Thread::machine(0).with_context(
                ProcessingContext::idle(0).with_run_queue(vec![ExecutionUnit::new(1, "runtime.main")]),
            )],
            parked: vec![ParkedUnit::new(ExecutionUnit::new(1, "runtime.main"), "chan receive")],
        };
        assert_eq!(
            check(&model),
            Err(InvariantViolation::DuplicateUnit {
                unit: UnitId(1),
                first: UnitLocation::RunQueue(ContextId(0)),
                second: UnitLocation::Parked,
            })
        );
    }

    #[test]
    fn test_duplicate_within_one_run_queue_detected() {
        let unit = ExecutionUnit::new(4, "main.main.func1");
        let model = Model {
            threads: vec![Thread::unclaimed(
                ProcessingContext::idle(0).with_run_queue(vec![unit.clone(), unit]),
            )],
            parked: Vec::new(),
        };
        assert!(matches!(
            check(&model),
            Err(InvariantViolation::DuplicateUnit { unit: UnitId(4), .. })
        ));
    }
}
