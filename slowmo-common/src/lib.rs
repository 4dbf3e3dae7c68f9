//! # Shared Wire Protocol (Event Producer ↔ Reconstruction Engine)
//!
//! Defines the messages streamed by the compile-and-run service while it
//! executes an instrumented program. The producer side reads raw probe records
//! from the instrumented runtime, interprets program counters, and bundles the
//! records belonging to one scheduling decision before sending them here.
//!
//! Every payload field is optional on the wire: the producer may omit anything
//! it could not observe, and it is the consumer's job to decide which fields a
//! given transition actually requires. Tagged enums decode unknown tags into an
//! `Unknown` variant so a newer producer never breaks an older consumer.
//!
//! ## Key Types
//!
//! - [`CompileRequest`] - Request that opens one run
//! - [`ServerMessage`] - One message of the response stream
//! - [`ProbeEvent`] - Scheduler probe event (`run_event` payload)
//! - [`NotificationEvent`] / [`StructureStateEvent`] - The two probe families
//!
//! ## Identifier Widths
//!
//! All identifiers travel as 64-bit unsigned integers. A negative id on the
//! producer side ("not applicable") is sent as an absent field.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request
// ============================================================================

/// Runtime version used when the caller does not ask for a specific one
pub const DEFAULT_RUNTIME_VERSION: &str = "go1.24";

/// Request that opens one compile-and-run stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Program source submitted by the user
    pub source: String,
    /// Toolchain/runtime version the program is compiled against
    pub runtime_version: String,
}

impl CompileRequest {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), runtime_version: DEFAULT_RUNTIME_VERSION.to_string() }
    }

    #[must_use]
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }
}

// ============================================================================
// Response Stream
// ============================================================================

/// One message of the compile-and-run response stream
///
/// Serialized with a `type` tag, e.g. `{"type":"runtime_output","chunk":"hi\n"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The submitted source did not compile. Terminates the stream.
    CompilationError {
        #[serde(default)]
        message: Option<String>,
    },

    /// The program exited; `error_message` is set when it exited abnormally.
    RuntimeResult {
        #[serde(default)]
        error_message: Option<String>,
    },

    /// A chunk of the program's stdout/stderr
    RuntimeOutput {
        #[serde(default)]
        chunk: String,
    },

    /// Number of processing contexts the runtime starts with
    ///
    /// Sent once, before the first run event. Seeds the initial population.
    ConcurrencyWidth {
        #[serde(default)]
        count: Option<u64>,
    },

    /// A scheduler probe event
    RunEvent { event: ProbeEvent },

    /// A message kind this build does not know about
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Probe Events
// ============================================================================

/// Scheduler probe event, tagged by `category`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ProbeEvent {
    /// Something happened that changes bindings but carries no structure state
    Notification { event: NotificationEvent },

    /// Full state of one or more structures at the moment of a decision
    StructureState { event: StructureStateEvent },

    /// A unit reached a new source line (presentation highlighting only)
    Progress(ProgressEvent),

    #[serde(other)]
    Unknown,
}

/// Notification probes, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    Schedule(ScheduleEvent),
    NewContext(NewContextEvent),
    Park(ParkEvent),
    #[serde(other)]
    Unknown,
}

/// Structure-state probes, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureStateEvent {
    Execute(ExecuteEvent),
    RunqStatus(RunqStatusEvent),
    Ready(ReadyEvent),
    #[serde(other)]
    Unknown,
}

/// Why a machine thread entered the scheduler
///
/// Derived by the producer from the callstack of the scheduler entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleReason {
    /// Thread startup and first context acquisition
    Mstart,
    /// The running unit parked itself
    Gopark,
    /// The running unit exited
    Goexit,
    #[default]
    #[serde(other)]
    Other,
}

impl ScheduleReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleReason::Mstart => "MSTART",
            ScheduleReason::Gopark => "GOPARK",
            ScheduleReason::Goexit => "GOEXIT",
            ScheduleReason::Other => "OTHER",
        }
    }
}

/// Source position resolved from a program counter
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub function: Option<String>,
}

/// An execution unit as reported by the producer
///
/// `entry_function_name` is absent when the producer could not interpret the
/// unit's start PC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub entry_function_name: Option<String>,
}

impl UnitRecord {
    #[must_use]
    pub fn new(id: u64, entry_function_name: impl Into<String>) -> Self {
        Self { id: Some(id), entry_function_name: Some(entry_function_name.into()) }
    }
}

/// A machine thread entered the scheduler and holds (or acquired) a context
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleEvent {
    #[serde(default)]
    pub machine_id: Option<u64>,
    #[serde(default)]
    pub context_id: Option<u64>,
    #[serde(default)]
    pub reason: Option<ScheduleReason>,
}

/// A unit created a new unit (diagnostics only)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewContextEvent {
    #[serde(default)]
    pub machine_id: Option<u64>,
    #[serde(default)]
    pub creator_unit_id: Option<u64>,
    #[serde(default)]
    pub start_location: Option<SourceLocation>,
}

/// The running unit on a machine thread parked itself
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParkEvent {
    #[serde(default)]
    pub machine_id: Option<u64>,
    #[serde(default)]
    pub parked_unit: Option<UnitRecord>,
    #[serde(default)]
    pub wait_reason: Option<String>,
}

/// The scheduler on a machine thread picked a unit to run
///
/// `context_snapshots` holds the run queue of every context as observed at the
/// moment of the decision (one decision may steal from several contexts).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecuteEvent {
    #[serde(default)]
    pub machine_id: Option<u64>,
    #[serde(default)]
    pub context_id: Option<u64>,
    #[serde(default)]
    pub found_unit: Option<UnitRecord>,
    #[serde(default)]
    pub context_snapshots: Vec<RunqStatusEvent>,
}

/// Complete run-queue state of one context
///
/// `machine_id` is absent when no machine thread owned the context at the time
/// it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunqStatusEvent {
    #[serde(default)]
    pub context_id: Option<u64>,
    #[serde(default)]
    pub machine_id: Option<u64>,
    #[serde(default)]
    pub run_next: Option<UnitRecord>,
    #[serde(default)]
    pub run_queue_entries: Vec<UnitRecord>,
}

/// A parked unit became runnable and was put on a context's run queue
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadyEvent {
    #[serde(default)]
    pub unit_id: Option<u64>,
    #[serde(default)]
    pub context_update: Option<RunqStatusEvent>,
}

/// A unit running on a machine thread reached a source location
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub machine_id: Option<u64>,
    #[serde(default)]
    pub unit_id: Option<u64>,
    #[serde(default)]
    pub source_location: Option<SourceLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_schedule_notification() {
        let json = r#"{"type":"run_event","event":{"category":"notification","event":
            {"kind":"schedule","machine_id":3,"context_id":0,"reason":"MSTART"}}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();

        let ServerMessage::RunEvent { event: ProbeEvent::Notification { event } } = msg else {
            panic!("expected notification, got {msg:?}");
        };
        assert_eq!(
            event,
            NotificationEvent::Schedule(ScheduleEvent {
                machine_id: Some(3),
                context_id: Some(0),
                reason: Some(ScheduleReason::Mstart),
            })
        );
    }

    #[test]
    fn test_missing_fields_decode_as_none() {
        let json = r#"{"category":"structure_state","event":{"kind":"runq_status"}}"#;
        let event: ProbeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ProbeEvent::StructureState {
                event: StructureStateEvent::RunqStatus(RunqStatusEvent::default())
            }
        );
    }

    #[test]
    fn test_unknown_tags_decode_as_unknown() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"heartbeat","n":1}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);

        let event: ProbeEvent =
            serde_json::from_str(r#"{"category":"notification","event":{"kind":"semacquire"}}"#)
                .unwrap();
        assert_eq!(event, ProbeEvent::Notification { event: NotificationEvent::Unknown });
    }

    #[test]
    fn test_unknown_schedule_reason_is_other() {
        let event: ScheduleEvent =
            serde_json::from_str(r#"{"machine_id":1,"reason":"PREEMPTED"}"#).unwrap();
        assert_eq!(event.reason, Some(ScheduleReason::Other));
    }

    #[test]
    fn test_large_ids_are_not_truncated() {
        let json = format!(r#"{{"machine_id":{},"unit_id":{}}}"#, u64::MAX, u64::MAX - 1);
        let event: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.machine_id, Some(u64::MAX));
        assert_eq!(event.unit_id, Some(u64::MAX - 1));
    }

    #[test]
    fn test_compile_request_defaults_runtime_version() {
        let request = CompileRequest::new("package main");
        assert_eq!(request.runtime_version, DEFAULT_RUNTIME_VERSION);
        let request = request.with_runtime_version("go1.22");
        assert_eq!(request.runtime_version, "go1.22");
    }
}
