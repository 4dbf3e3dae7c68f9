//! # Binding Reconciliation
//!
//! Keeps thread ↔ context ownership consistent when contexts change hands.
//!
//! Contexts move between machine threads one link at a time: the thread that
//! takes a context gives up whatever it owned before, and that displaced
//! context becomes a freestanding, unclaimed entry until a later event binds
//! it again. Nothing is ever dropped silently.
//!
//! Both operations take the thread list by value and hand back the new list,
//! so a caller working on a staged copy can discard it on error.
//!
//! Thread positions are stable: entries are updated in place, new entries are
//! appended, and the only removal is pruning of dead entries.

use log::debug;

use crate::domain::{ContextId, InvariantViolation, MachineId};
use crate::model::{ProcessingContext, Thread};

/// Make machine `machine` own context `context`.
///
/// `replacement`, when given, becomes the new state of the context (a fresh
/// run-queue observation); otherwise the context moves unchanged.
///
/// # Errors
///
/// Fails with [`InvariantViolation::UnknownContext`] when no thread owns
/// `context`: a context has to be known before it can be rebound.
pub fn rebind(
    mut threads: Vec<Thread>,
    machine: MachineId,
    context: ContextId,
    replacement: Option<ProcessingContext>,
) -> Result<Vec<Thread>, InvariantViolation> {
    let owner = position_of_context(&threads, context)?;

    let target = match threads.iter().position(|thread| thread.machine_id == Some(machine)) {
        Some(index) => index,
        None => {
            debug!("{machine} first seen, acquiring {context}");
            threads.push(Thread { machine_id: Some(machine), ..Thread::default() });
            threads.len() - 1
        }
    };

    let previous = threads[owner].bound_context.take();
    let Some(bound) = replacement.or(previous) else {
        return Err(InvariantViolation::UnknownContext(context));
    };

    if let Some(displaced) = threads[target].bound_context.replace(bound) {
        debug!("{machine} took {context}, {} left unclaimed", displaced.id);
        threads.push(Thread::unclaimed(displaced));
    }

    Ok(prune(threads))
}

/// Record that `context` is no longer owned by any machine thread.
///
/// If the context already sits in an unclaimed entry, that entry is updated in
/// place. Otherwise its owner loses it and the new state is appended as an
/// unclaimed entry.
///
/// # Errors
///
/// Fails with [`InvariantViolation::UnknownContext`] when no thread owns
/// `context`.
pub fn release(
    mut threads: Vec<Thread>,
    context: ContextId,
    state: ProcessingContext,
) -> Result<Vec<Thread>, InvariantViolation> {
    let owner = position_of_context(&threads, context)?;

    if threads[owner].machine_id.is_none() {
        threads[owner].bound_context = Some(state);
        return Ok(threads);
    }

    debug!("{context} went idle, released by thread #{owner}");
    threads[owner].bound_context = None;
    threads.push(Thread::unclaimed(state));
    Ok(prune(threads))
}

fn position_of_context(threads: &[Thread], context: ContextId) -> Result<usize, InvariantViolation> {
    threads
        .iter()
        .position(|thread| thread.context_id() == Some(context))
        .ok_or(InvariantViolation::UnknownContext(context))
}

fn prune(mut threads: Vec<Thread>) -> Vec<Thread> {
    threads.retain(|thread| !thread.is_dead());
    threads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExecutionUnit;

    fn context_with_queue(id: u32, units: &[u64]) -> ProcessingContext {
        ProcessingContext::idle(id)
            .with_run_queue(units.iter().map(|&unit| ExecutionUnit::new(unit, "main.work")).collect())
    }

    #[test]
    fn test_new_machine_claims_unclaimed_context() {
        let threads = vec![
            Thread::machine(0).with_context(ProcessingContext::idle(0)),
            Thread::unclaimed(ProcessingContext::idle(1)),
        ];

        let threads = rebind(threads, MachineId(1), ContextId(1), None).unwrap();

        assert_eq!(
            threads,
            vec![
                Thread::machine(0).with_context(ProcessingContext::idle(0)),
                Thread::machine(1).with_context(ProcessingContext::idle(1)),
            ]
        );
    }

    #[test]
    fn test_handoff_leaves_previous_owner_without_context() {
        let threads = vec![
            Thread::machine(0).with_context(context_with_queue(0, &[3, 4])),
            Thread::machine(2).with_context(ProcessingContext::idle(1)),
        ];

        let threads = rebind(threads, MachineId(3), ContextId(0), None).unwrap();

        assert_eq!(threads.len(), 3);
        assert_eq!(threads[0], Thread::machine(0));
        assert_eq!(threads[1].context_id(), Some(ContextId(1)));
        assert_eq!(threads[2], Thread::machine(3).with_context(context_with_queue(0, &[3, 4])));
    }

    #[test]
    fn test_displaced_context_becomes_unclaimed_entry() {
        let threads = vec![
            Thread::machine(0).with_context(ProcessingContext::idle(0)),
            Thread::machine(1).with_context(context_with_queue(1, &[9])),
        ];

        let threads = rebind(threads, MachineId(1), ContextId(0), None).unwrap();

        assert_eq!(
            threads,
            vec![
                Thread::machine(0),
                Thread::machine(1).with_context(ProcessingContext::idle(0)),
                Thread::unclaimed(context_with_queue(1, &[9])),
            ]
        );
    }

    #[test]
    fn test_rebind_to_same_owner_replaces_state() {
        let threads = vec![Thread::machine(2).with_context(context_with_queue(1, &[7]))];

        let threads =
            rebind(threads, MachineId(2), ContextId(1), Some(context_with_queue(1, &[]))).unwrap();

        assert_eq!(threads, vec![Thread::machine(2).with_context(ProcessingContext::idle(1))]);
    }

    #[test]
    fn test_claimed_placeholder_is_pruned() {
        let threads = vec![
            Thread::machine(0).with_context(ProcessingContext::idle(0)),
            Thread::unclaimed(ProcessingContext::idle(1)),
            Thread::machine(4),
        ];

        let threads = rebind(threads, MachineId(4), ContextId(1), None).unwrap();

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[1], Thread::machine(4).with_context(ProcessingContext::idle(1)));
    }

    #[test]
    fn test_rebind_unknown_context_fails() {
        let threads = vec![Thread::machine(0).with_context(ProcessingContext::idle(0))];

        let err = rebind(threads, MachineId(0), ContextId(5), None).unwrap_err();

        assert_eq!(err, InvariantViolation::UnknownContext(ContextId(5)));
    }

    #[test]
    fn test_release_moves_context_to_unclaimed_entry() {
        let threads = vec![
            Thread::machine(0).with_context(context_with_queue(0, &[1])).scheduling(true),
            Thread::machine(2).with_context(ProcessingContext::idle(1)),
        ];

        let threads = release(threads, ContextId(0), ProcessingContext::idle(0)).unwrap();

        assert_eq!(
            threads,
            vec![
                Thread::machine(0).scheduling(true),
                Thread::machine(2).with_context(ProcessingContext::idle(1)),
                Thread::unclaimed(ProcessingContext::idle(0)),
            ]
        );
    }

    #[test]
    fn test_release_updates_unclaimed_entry_in_place() {
        let threads = vec![
            Thread::unclaimed(ProcessingContext::idle(1)),
            Thread::machine(0).with_context(ProcessingContext::idle(0)),
        ];

        let threads = release(threads, ContextId(1), context_with_queue(1, &[8])).unwrap();

        assert_eq!(threads[0], Thread::unclaimed(context_with_queue(1, &[8])));
        assert_eq!(threads.len(), 2);
    }

    #[test]
    fn test_release_unknown_context_fails() {
        let err = release(Vec::new(), ContextId(2), ProcessingContext::idle(2)).unwrap_err();
        assert_eq!(err, InvariantViolation::UnknownContext(ContextId(2)));
    }
}
