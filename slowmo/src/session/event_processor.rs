//! # Session Message Processing
//!
//! Routes each message of the compile-and-run response stream to the part of
//! the session that owns it.
//!
//! ## Message Routing
//!
//! - `compilation_error` / `runtime_output` / `runtime_result` → [`RunOutput`]
//! - `concurrency_width` → [`Engine::seed`]
//! - `run_event` → [`Engine::decode`] then [`Engine::apply_event`], plus
//!   [`Highlights`] for progress and schedule events once the engine accepted
//!   them
//! - anything else → logged and counted
//!
//! A failure of any kind moves the output into its matching final state, so
//! the presentation layer always knows why a run stopped.

use std::collections::BTreeMap;

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use serde::Serialize;
use slowmo_common::ServerMessage;

use super::highlights::Highlights;
use super::output::RunOutput;
use crate::domain::{EngineError, SessionError};
use crate::engine::{Engine, EngineUpdate, Snapshot};
use crate::events::SchedulerEvent;

/// Whether the stream should keep being read after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Continue,
    /// The program exited; nothing meaningful follows
    Finished,
}

/// What a finished session looked like
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub messages: usize,
    /// Scheduler events per kind
    pub events: BTreeMap<&'static str, usize>,
    pub unrecognized: usize,
    pub commits: u64,
    pub new_contexts: u64,
    pub dropped_updates: u64,
    pub output: RunOutput,
    /// Last committed snapshot before teardown
    pub last_snapshot: Snapshot,
}

/// Encapsulates the state of one run
#[derive(Debug, Default)]
pub struct SessionProcessor {
    engine: Engine,
    output: RunOutput,
    highlights: Highlights,

    pub message_count: usize,
    /// Per-kind counters for diagnostics
    pub event_counts: BTreeMap<&'static str, usize>,
    /// Stream messages this build does not know; unknown probe events are
    /// counted by the engine
    pub unrecognized_count: usize,
}

impl SessionProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`Engine::subscribe`]
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<EngineUpdate> {
        self.engine.subscribe(capacity)
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn output(&self) -> &RunOutput {
        &self.output
    }

    #[must_use]
    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }

    /// Process a single stream message
    ///
    /// # Errors
    ///
    /// Returns the error that ends the session: a compilation error, a
    /// reconstruction failure, or a message arriving out of order.
    pub fn process_message(&mut self, message: ServerMessage) -> Result<SessionStep, SessionError> {
        self.message_count += 1;
        let result = self.route(message);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Record why the session stopped in the output state
    pub fn fail(&mut self, err: &SessionError) {
        match err {
            SessionError::Request(transport) => self.output.request_failed(transport.to_string()),
            // Output state was already set while routing
            SessionError::Compilation(_) => {}
            SessionError::Reconstruction(_) | SessionError::Protocol(_) | SessionError::Aborted => {
                if !self.output.is_final() {
                    self.output.abort(err.to_string());
                }
            }
        }
        warn!("Session stopped: {err}");
    }

    /// Tear the session down, resetting the engine for subscribers
    #[must_use]
    pub fn finish(mut self) -> SessionSummary {
        let last_snapshot = self.engine.snapshot();
        let stats = self.engine.stats().clone();
        self.engine.reset();
        self.highlights.clear();
        let unrecognized = self
            .unrecognized_count
            .saturating_add(usize::try_from(stats.unrecognized).unwrap_or(usize::MAX));
        info!(
            "Session finished: {} messages, {} commits, {unrecognized} unrecognized",
            self.message_count, stats.committed
        );

        SessionSummary {
            messages: self.message_count,
            events: self.event_counts,
            unrecognized,
            commits: stats.committed,
            new_contexts: stats.new_contexts,
            dropped_updates: stats.dropped_updates,
            output: self.output,
            last_snapshot,
        }
    }

    // Private message handlers

    fn route(&mut self, message: ServerMessage) -> Result<SessionStep, SessionError> {
        match message {
            ServerMessage::CompilationError { message } => {
                let message = message.unwrap_or_default();
                self.output.compilation_failed(message.clone())?;
                Err(SessionError::Compilation(message))
            }
            ServerMessage::RuntimeResult { error_message } => {
                if let Some(error) = &error_message {
                    info!("Program exited with error: {error}");
                }
                self.output.exit(error_message)?;
                Ok(SessionStep::Finished)
            }
            ServerMessage::RuntimeOutput { chunk } => {
                self.output.append(&chunk)?;
                Ok(SessionStep::Continue)
            }
            ServerMessage::ConcurrencyWidth { count } => {
                self.ensure_engine_usable()?;
                self.output.start()?;
                self.engine.seed(count)?;
                Ok(SessionStep::Continue)
            }
            ServerMessage::RunEvent { event } => {
                self.ensure_engine_usable()?;
                self.output.start()?;
                if let Some(event) = self.engine.decode(event)? {
                    self.handle_event(&event)?;
                }
                Ok(SessionStep::Continue)
            }
            ServerMessage::Unknown => {
                warn!("Unknown stream message type");
                self.unrecognized_count += 1;
                Ok(SessionStep::Continue)
            }
        }
    }

    // A run whose reconstruction failed reports that, not the output state
    fn ensure_engine_usable(&self) -> Result<(), EngineError> {
        if self.engine.is_corrupted() {
            return Err(EngineError::Corrupted);
        }
        Ok(())
    }

    fn handle_event(&mut self, event: &SchedulerEvent) -> Result<(), EngineError> {
        self.engine.apply_event(event)?;
        *self.event_counts.entry(event.kind()).or_default() += 1;

        match event {
            SchedulerEvent::Schedule(schedule) => {
                if self.highlights.clear_machine(schedule.machine).is_some() {
                    debug!("{} entered the scheduler ({})", schedule.machine, schedule.reason.as_str());
                }
            }
            SchedulerEvent::Progress(progress) => self.highlights.record(progress),
            _ => {}
        }
        Ok(())
    }
}
