//! Scheduler model reconstructed from the event stream
//!
//! Plain data: the engine is the only writer, everybody else sees it through
//! an immutable [`Snapshot`](crate::engine::Snapshot).

use serde::Serialize;

use crate::domain::{ContextId, MachineId, UnitId, UnitLocation};

/// A schedulable unit of work (G)
///
/// Never mutated in place; a unit that moves is replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionUnit {
    pub id: UnitId,
    pub entry_function_name: String,
}

impl ExecutionUnit {
    pub fn new(id: u64, entry_function_name: impl Into<String>) -> Self {
        Self { id: UnitId(id), entry_function_name: entry_function_name.into() }
    }
}

/// A unit suspended until some condition holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParkedUnit {
    #[serde(flatten)]
    pub unit: ExecutionUnit,
    pub wait_reason: String,
}

impl ParkedUnit {
    pub fn new(unit: ExecutionUnit, wait_reason: impl Into<String>) -> Self {
        Self { unit, wait_reason: wait_reason.into() }
    }
}

/// A scheduling context (P) with its local run queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingContext {
    pub id: ContextId,
    /// Single-slot priority entry, logically ahead of `run_queue`
    pub run_next: Option<ExecutionUnit>,
    pub run_queue: Vec<ExecutionUnit>,
}

impl ProcessingContext {
    /// A context with empty run queues
    pub fn idle(id: u32) -> Self {
        Self { id: ContextId(id), run_next: None, run_queue: Vec::new() }
    }

    #[must_use]
    pub fn with_run_next(mut self, unit: ExecutionUnit) -> Self {
        self.run_next = Some(unit);
        self
    }

    #[must_use]
    pub fn with_run_queue(mut self, units: Vec<ExecutionUnit>) -> Self {
        self.run_queue = units;
        self
    }

    /// Number of units waiting on this context, `run_next` included
    pub fn queued(&self) -> usize {
        self.run_queue.len() + usize::from(self.run_next.is_some())
    }
}

/// A machine thread together with the context it owns, if any
///
/// Besides the fully bound state an entry may be:
/// - machine without context: its context was handed to another thread
/// - context without machine: a context nobody has claimed yet
///
/// An entry with neither is dead and gets pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub machine_id: Option<MachineId>,
    pub is_scheduling: bool,
    pub bound_context: Option<ProcessingContext>,
    pub executing: Option<ExecutionUnit>,
}

impl Thread {
    /// A running machine thread that has not been bound yet
    pub fn machine(id: u64) -> Self {
        Self { machine_id: Some(MachineId(id)), ..Self::default() }
    }

    /// An unclaimed context waiting for a machine thread
    pub fn unclaimed(context: ProcessingContext) -> Self {
        Self { bound_context: Some(context), ..Self::default() }
    }

    #[must_use]
    pub fn with_context(mut self, context: ProcessingContext) -> Self {
        self.bound_context = Some(context);
        self
    }

    #[must_use]
    pub fn with_executing(mut self, unit: ExecutionUnit) -> Self {
        self.executing = Some(unit);
        self
    }

    #[must_use]
    pub fn scheduling(mut self, is_scheduling: bool) -> Self {
        self.is_scheduling = is_scheduling;
        self
    }

    /// Dead entries are pruned right after every reconciliation step
    pub fn is_dead(&self) -> bool {
        self.machine_id.is_none() && self.bound_context.is_none()
    }

    pub fn context_id(&self) -> Option<ContextId> {
        self.bound_context.as_ref().map(|context| context.id)
    }
}

/// Complete reconstructed scheduler state of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Model {
    /// Append-only except for pruning, so positions stay stable for renderers
    pub threads: Vec<Thread>,
    /// Parked units in the order they were parked
    pub parked: Vec<ParkedUnit>,
}

impl Model {
    /// Initial population for a runtime starting with `width` contexts
    ///
    /// Thread 0 owns context 0 and runs the bootstrap unit; every other
    /// context starts unclaimed.
    pub fn seeded(width: u32) -> Self {
        let threads = (0..width)
            .map(|index| {
                if index == 0 {
                    Thread::machine(0)
                        .with_context(ProcessingContext::idle(0))
                        .with_executing(ExecutionUnit::new(0, ""))
                } else {
                    Thread::unclaimed(ProcessingContext::idle(index))
                }
            })
            .collect();
        Self { threads, parked: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty() && self.parked.is_empty()
    }

    pub fn thread(&self, machine: MachineId) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.machine_id == Some(machine))
    }

    pub fn owner_of(&self, context: ContextId) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.context_id() == Some(context))
    }

    pub fn context(&self, context: ContextId) -> Option<&ProcessingContext> {
        self.owner_of(context).and_then(|thread| thread.bound_context.as_ref())
    }

    pub fn parked_unit(&self, unit: UnitId) -> Option<&ParkedUnit> {
        self.parked.iter().find(|parked| parked.unit.id == unit)
    }

    /// Every unit reference in the model together with where it sits
    pub fn unit_locations(&self) -> Vec<(UnitId, UnitLocation)> {
        let mut locations = Vec::new();
        for (index, thread) in self.threads.iter().enumerate() {
            if let Some(unit) = &thread.executing {
                locations.push((unit.id, UnitLocation::Executing { thread: index }));
            }
            if let Some(context) = &thread.bound_context {
                if let Some(unit) = &context.run_next {
                    locations.push((unit.id, UnitLocation::RunNext(context.id)));
                }
                for unit in &context.run_queue {
                    locations.push((unit.id, UnitLocation::RunQueue(context.id)));
                }
            }
        }
        for parked in &self.parked {
            locations.push((parked.unit.id, UnitLocation::Parked));
        }
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_population() {
        let model = Model::seeded(3);

        assert_eq!(model.threads.len(), 3);
        let bootstrap = model.thread(MachineId(0)).unwrap();
        assert_eq!(bootstrap.context_id(), Some(ContextId(0)));
        assert_eq!(bootstrap.executing, Some(ExecutionUnit::new(0, "")));

        for index in 1..3u32 {
            let owner = model.owner_of(ContextId(index)).unwrap();
            assert_eq!(owner.machine_id, None);
            assert!(!owner.is_scheduling);
        }
        assert!(model.parked.is_empty());
    }

    #[test]
    fn test_dead_thread_detection() {
        assert!(Thread::default().is_dead());
        assert!(!Thread::machine(1).is_dead());
        assert!(!Thread::unclaimed(ProcessingContext::idle(1)).is_dead());
    }

    #[test]
    fn test_unit_locations_cover_every_structure() {
        let model = Model {
            threads: vec![Thread::machine(0)
                .with_context(
                    ProcessingContext::idle(0)
                        .with_run_next(ExecutionUnit::new(5, "main.worker"))
                        .with_run_queue(vec![ExecutionUnit::new(6, "main.worker")]),
                )
                .with_executing(ExecutionUnit::new(1, "runtime.main"))],
            parked: vec![ParkedUnit::new(ExecutionUnit::new(2, "runtime.forcegchelper"), "idle")],
        };

        assert_eq!(
            model.unit_locations(),
            vec![
                (UnitId(1), UnitLocation::Executing { thread: 0 }),
                (UnitId(5), UnitLocation::RunNext(ContextId(0))),
                (UnitId(6), UnitLocation::RunQueue(ContextId(0))),
                (UnitId(2), UnitLocation::Parked),
            ]
        );
        assert_eq!(model.context(ContextId(0)).unwrap().queued(), 2);
    }

    #[test]
    fn test_parked_unit_serializes_flat() {
        let parked = ParkedUnit::new(ExecutionUnit::new(1, "runtime.main"), "sync.WaitGroup.Wait");
        let json = serde_json::to_value(&parked).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["entry_function_name"], "runtime.main");
        assert_eq!(json["wait_reason"], "sync.WaitGroup.Wait");
    }
}
