//! # Scheduler State Reconstruction Engine
//!
//! Consumes probe events one at a time and keeps a consistent model of the
//! scheduler's threads, contexts, run queues and parked units.
//!
//! ## Pipeline
//!
//! ```text
//! ProbeEvent ──▶ events::decode ──▶ transitions ──▶ commit ──▶ Snapshot
//!  (wire)        (validation)       (Decision)      (staged,    (published
//!                                                   invariants)  to subscribers)
//! ```
//!
//! - [`rebind`]: thread ↔ context handoff algorithm
//! - [`transitions`]: one function per event kind, producing a [`Decision`]
//! - [`commit`]: applies a whole decision to a staged model
//! - [`invariants`]: structural checks run before every commit
//!
//! ## Failure Model
//!
//! A validation or invariant failure rejects the event without touching the
//! published model and marks the engine corrupted: every later event is
//! refused with [`EngineError::Corrupted`] until [`Engine::reset`] starts a new
//! run. A run whose reconstruction diverged once cannot be trusted afterwards.
//!
//! ## Subscriptions
//!
//! [`Engine::subscribe`] hands out a bounded channel receiving one
//! [`EngineUpdate::Committed`] per committed decision. A subscriber that falls
//! behind misses intermediate snapshots (each snapshot is complete, so the
//! next one supersedes them); a dropped receiver is forgotten.

pub mod commit;
pub mod invariants;
pub mod rebind;
pub mod transitions;

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use serde::Serialize;
use slowmo_common::ProbeEvent;

pub use commit::{ChangeSet, Decision, ParkedChange, StructureDelta};

use crate::domain::{EngineError, InvariantViolation, ValidationError};
use crate::events::{self, Decoded, Progress, SchedulerEvent};
use crate::model::Model;

/// Immutable view of the model after a committed decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Incremented once per committed decision; 0 is the empty model
    pub sequence: u64,
    pub model: Arc<Model>,
    /// What the decision that produced this snapshot changed
    pub changes: ChangeSet,
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineUpdate {
    Committed(Snapshot),
    /// Presentation-only; not part of the model
    Progress(Progress),
    /// The run ended and the model was discarded
    Reset,
}

/// Counters kept for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub committed: u64,
    pub new_contexts: u64,
    pub progress: u64,
    pub unrecognized: u64,
    pub dropped_updates: u64,
}

/// Reconstruction engine for exactly one run
#[derive(Debug, Default)]
pub struct Engine {
    current: Snapshot,
    corrupted: bool,
    stats: EngineStats,
    subscribers: Vec<Sender<EngineUpdate>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self { sequence: 0, model: Arc::new(Model::default()), changes: ChangeSet::default() }
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already reconstructed model instead of an empty one
    ///
    /// # Errors
    ///
    /// Fails if `model` breaks a structural invariant.
    pub fn from_model(model: Model) -> Result<Self, InvariantViolation> {
        invariants::check(&model)?;
        Ok(Self {
            current: Snapshot { model: Arc::new(model), ..Snapshot::default() },
            ..Self::default()
        })
    }

    /// Latest committed snapshot
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.current.clone()
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.current.model
    }

    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Register an observer; updates beyond `capacity` unread ones are dropped.
    ///
    /// A zero capacity is raised to 1, since a rendezvous channel would never
    /// accept a `try_send`.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<EngineUpdate> {
        let (tx, rx) = bounded(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    /// Seed the initial population for a runtime with `width` contexts.
    ///
    /// `width` is the wire value and may be absent.
    ///
    /// # Errors
    ///
    /// Fails if `width` is missing, zero or does not fit a context id, or if
    /// the run already has a population.
    pub fn seed(&mut self, width: Option<u64>) -> Result<Snapshot, EngineError> {
        self.guarded(|engine| {
            let width = width.ok_or_else(|| ValidationError::missing("ConcurrencyWidth", "count"))?;
            let width = u32::try_from(width)
                .ok()
                .filter(|&width| width > 0)
                .ok_or_else(|| {
                    ValidationError::invalid(
                        "ConcurrencyWidth",
                        "count",
                        format!("{width} is not a usable context count"),
                    )
                })?;
            if !engine.current.model.is_empty() {
                return Err(InvariantViolation::AlreadySeeded.into());
            }
            info!("Seeding {width} processing contexts");
            let changes = ChangeSet { threads: true, ..ChangeSet::default() };
            Ok(engine.publish_commit(Model::seeded(width), changes))
        })
    }

    /// Validate and apply one wire probe event.
    ///
    /// Unrecognized probe kinds are logged and skipped; the current snapshot
    /// is returned unchanged.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_event`]; additionally fails with a validation error
    /// when a required field is missing.
    pub fn apply(&mut self, event: ProbeEvent) -> Result<Snapshot, EngineError> {
        match self.decode(event)? {
            Some(event) => self.apply_event(&event),
            None => Ok(self.snapshot()),
        }
    }

    /// Validate one wire probe event without applying it.
    ///
    /// Returns `None` for unrecognized probe kinds, which are counted and
    /// skipped. A validation failure latches the engine like any other
    /// failure.
    ///
    /// # Errors
    ///
    /// Fails with a validation error when a required field is missing, or
    /// [`EngineError::Corrupted`] after an earlier failure.
    pub fn decode(&mut self, event: ProbeEvent) -> Result<Option<SchedulerEvent>, EngineError> {
        if self.corrupted {
            return Err(EngineError::Corrupted);
        }
        match events::decode(event) {
            Ok(Decoded::Event(event)) => Ok(Some(event)),
            Ok(Decoded::Unrecognized(family)) => {
                warn!("Ignoring unrecognized {family} event");
                self.stats.unrecognized += 1;
                Ok(None)
            }
            Err(err) => {
                self.corrupted = true;
                Err(err.into())
            }
        }
    }

    /// Apply one validated event.
    ///
    /// # Errors
    ///
    /// Fails with an invariant violation when the event cannot be applied to
    /// the current model, or [`EngineError::Corrupted`] after an earlier
    /// failure. The published model is unchanged in both cases.
    pub fn apply_event(&mut self, event: &SchedulerEvent) -> Result<Snapshot, EngineError> {
        self.guarded(|engine| {
            debug!("Applying {} event: {event:?}", event.kind());
            let decision = match event {
                SchedulerEvent::Schedule(event) => transitions::schedule(event),
                SchedulerEvent::Execute(event) => transitions::execute(event),
                SchedulerEvent::RunqStatus(snapshot) => transitions::runq_status(snapshot),
                SchedulerEvent::Park(event) => transitions::park(event),
                SchedulerEvent::Ready(event) => transitions::ready(event),
                SchedulerEvent::NewContext(event) => {
                    engine.stats.new_contexts += 1;
                    debug!(
                        "New unit {} created by {:?} on {:?}",
                        event.start_function.as_deref().unwrap_or("<unknown>"),
                        event.creator,
                        event.machine,
                    );
                    return Ok(engine.snapshot());
                }
                SchedulerEvent::Progress(progress) => {
                    engine.stats.progress += 1;
                    engine.publish(&EngineUpdate::Progress(progress.clone()));
                    return Ok(engine.snapshot());
                }
            };
            let (model, changes) = commit::apply(&engine.current.model, &decision)?;
            Ok(engine.publish_commit(model, changes))
        })
    }

    /// Discard the model and start over for a new run
    pub fn reset(&mut self) {
        info!(
            "Resetting engine after {} commits ({} new units, {} unrecognized events)",
            self.stats.committed, self.stats.new_contexts, self.stats.unrecognized
        );
        self.current = Snapshot::default();
        self.corrupted = false;
        self.stats = EngineStats::default();
        self.publish(&EngineUpdate::Reset);
    }

    fn guarded(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<Snapshot, EngineError>,
    ) -> Result<Snapshot, EngineError> {
        if self.corrupted {
            return Err(EngineError::Corrupted);
        }
        let result = step(self);
        if result.is_err() {
            self.corrupted = true;
        }
        result
    }

    fn publish_commit(&mut self, model: Model, changes: ChangeSet) -> Snapshot {
        self.current =
            Snapshot { sequence: self.current.sequence + 1, model: Arc::new(model), changes };
        self.stats.committed += 1;
        let snapshot = self.snapshot();
        self.publish(&EngineUpdate::Committed(snapshot.clone()));
        snapshot
    }

    fn publish(&mut self, update: &EngineUpdate) {
        let mut dropped = 0;
        self.subscribers.retain(|tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        self.stats.dropped_updates += dropped;
    }
}
