//! Validated scheduler events
//!
//! The wire format leaves every field optional. [`decode`] turns a wire
//! [`ProbeEvent`] into a closed [`SchedulerEvent`] whose fields are all
//! present and correctly typed, or reports exactly which field was missing.
//! Probe kinds this build does not know come back as
//! [`Decoded::Unrecognized`] so the caller can log and skip them.

use serde::Serialize;
use slowmo_common::{
    ExecuteEvent, NewContextEvent, NotificationEvent, ParkEvent, ProbeEvent, ProgressEvent,
    ReadyEvent, RunqStatusEvent, ScheduleEvent, ScheduleReason, StructureStateEvent, UnitRecord,
};

use crate::domain::{ContextId, MachineId, UnitId, ValidationError};
use crate::model::{ExecutionUnit, ProcessingContext};

const SCHEDULE: &str = "ScheduleEvent";
const EXECUTE: &str = "ExecuteEvent";
const RUNQ_STATUS: &str = "RunqStatusEvent";
const PARK: &str = "ParkEvent";
const READY: &str = "ReadyEvent";
const PROGRESS: &str = "ProgressEvent";

/// A scheduler event with every required field present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Schedule(Schedule),
    NewContext(NewContext),
    Execute(Execute),
    RunqStatus(ContextSnapshot),
    Park(Park),
    Ready(Ready),
    Progress(Progress),
}

impl SchedulerEvent {
    /// Short kind name for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerEvent::Schedule(_) => "schedule",
            SchedulerEvent::NewContext(_) => "new_context",
            SchedulerEvent::Execute(_) => "execute",
            SchedulerEvent::RunqStatus(_) => "runq_status",
            SchedulerEvent::Park(_) => "park",
            SchedulerEvent::Ready(_) => "ready",
            SchedulerEvent::Progress(_) => "progress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub machine: MachineId,
    pub context: ContextId,
    pub reason: ScheduleReason,
}

/// A unit spawned another; no structure changes, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContext {
    pub machine: Option<MachineId>,
    pub creator: Option<UnitId>,
    pub start_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    pub machine: MachineId,
    pub context: ContextId,
    pub found: ExecutionUnit,
    /// Run queues of every context at the moment of the decision
    pub snapshots: Vec<ContextSnapshot>,
}

/// Observed state of one context and the machine owning it, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub machine: Option<MachineId>,
    pub context: ProcessingContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Park {
    pub machine: MachineId,
    pub unit: ExecutionUnit,
    pub wait_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub unit: UnitId,
    /// Context the unit was queued on; always names its owning machine
    pub update: ContextSnapshot,
}

/// Source position reached by a running unit, forwarded to renderers as is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub machine: MachineId,
    pub unit: UnitId,
    pub line: u32,
    pub file: Option<String>,
    pub function: Option<String>,
}

/// Result of decoding a wire probe event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(SchedulerEvent),
    /// A probe kind newer than this build; carries the family it arrived in
    Unrecognized(&'static str),
}

/// Validate a wire probe event.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first missing or invalid field.
pub fn decode(event: ProbeEvent) -> Result<Decoded, ValidationError> {
    let event = match event {
        ProbeEvent::Notification { event } => match event {
            NotificationEvent::Schedule(event) => SchedulerEvent::Schedule(decode_schedule(event)?),
            NotificationEvent::NewContext(event) => {
                SchedulerEvent::NewContext(decode_new_context(event))
            }
            NotificationEvent::Park(event) => SchedulerEvent::Park(decode_park(event)?),
            NotificationEvent::Unknown => return Ok(Decoded::Unrecognized("notification")),
        },
        ProbeEvent::StructureState { event } => match event {
            StructureStateEvent::Execute(event) => SchedulerEvent::Execute(decode_execute(event)?),
            StructureStateEvent::RunqStatus(event) => {
                SchedulerEvent::RunqStatus(decode_snapshot(RUNQ_STATUS, "", event)?)
            }
            StructureStateEvent::Ready(event) => SchedulerEvent::Ready(decode_ready(event)?),
            StructureStateEvent::Unknown => return Ok(Decoded::Unrecognized("structure_state")),
        },
        ProbeEvent::Progress(event) => SchedulerEvent::Progress(decode_progress(event)?),
        ProbeEvent::Unknown => return Ok(Decoded::Unrecognized("probe")),
    };
    Ok(Decoded::Event(event))
}

fn decode_schedule(event: ScheduleEvent) -> Result<Schedule, ValidationError> {
    Ok(Schedule {
        machine: MachineId(required(SCHEDULE, "machine_id", event.machine_id)?),
        context: context_id(SCHEDULE, "context_id", event.context_id)?,
        reason: event.reason.unwrap_or_default(),
    })
}

fn decode_new_context(event: NewContextEvent) -> NewContext {
    NewContext {
        machine: event.machine_id.map(MachineId),
        creator: event.creator_unit_id.map(UnitId),
        start_function: event.start_location.and_then(|location| location.function),
    }
}

fn decode_execute(event: ExecuteEvent) -> Result<Execute, ValidationError> {
    let machine = MachineId(required(EXECUTE, "machine_id", event.machine_id)?);
    let found = required(EXECUTE, "found_unit", event.found_unit)?;
    let found = ExecutionUnit {
        id: UnitId(required(EXECUTE, "found_unit.id", found.id)?),
        entry_function_name: required(
            EXECUTE,
            "found_unit.entry_function_name",
            found.entry_function_name,
        )?,
    };
    let context = context_id(EXECUTE, "context_id", event.context_id)?;
    let snapshots = event
        .context_snapshots
        .into_iter()
        .enumerate()
        .map(|(index, snapshot)| {
            decode_snapshot(EXECUTE, &format!("context_snapshots[{index}]."), snapshot)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Execute { machine, context, found, snapshots })
}

fn decode_park(event: ParkEvent) -> Result<Park, ValidationError> {
    let machine = MachineId(required(PARK, "machine_id", event.machine_id)?);
    let unit = decode_unit(PARK, "parked_unit.", required(PARK, "parked_unit", event.parked_unit)?)?;
    let wait_reason = required(PARK, "wait_reason", event.wait_reason)?;
    Ok(Park { machine, unit, wait_reason })
}

fn decode_ready(event: ReadyEvent) -> Result<Ready, ValidationError> {
    let unit = UnitId(required(READY, "unit_id", event.unit_id)?);
    let update = required(READY, "context_update", event.context_update)?;
    if update.machine_id.is_none() {
        return Err(ValidationError::missing(READY, "context_update.machine_id"));
    }
    let update = decode_snapshot(READY, "context_update.", update)?;
    Ok(Ready { unit, update })
}

fn decode_progress(event: ProgressEvent) -> Result<Progress, ValidationError> {
    let machine = MachineId(required(PROGRESS, "machine_id", event.machine_id)?);
    let unit = UnitId(required(PROGRESS, "unit_id", event.unit_id)?);
    let location = required(PROGRESS, "source_location", event.source_location)?;
    Ok(Progress {
        machine,
        unit,
        line: required(PROGRESS, "source_location.line", location.line)?,
        file: location.file,
        function: location.function,
    })
}

/// `prefix` locates the snapshot inside its event, e.g. `context_snapshots[1].`
fn decode_snapshot(
    event: &'static str,
    prefix: &str,
    snapshot: RunqStatusEvent,
) -> Result<ContextSnapshot, ValidationError> {
    let id = context_id(event, &format!("{prefix}context_id"), snapshot.context_id)?;
    let run_next = snapshot
        .run_next
        .map(|unit| decode_unit(event, &format!("{prefix}run_next."), unit))
        .transpose()?;
    let run_queue = snapshot
        .run_queue_entries
        .into_iter()
        .enumerate()
        .map(|(index, unit)| decode_unit(event, &format!("{prefix}run_queue_entries[{index}]."), unit))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ContextSnapshot {
        machine: snapshot.machine_id.map(MachineId),
        context: ProcessingContext { id, run_next, run_queue },
    })
}

/// Queued and parked units only need an id; the producer sends no function
/// name when it could not interpret the unit's start PC.
fn decode_unit(
    event: &'static str,
    prefix: &str,
    unit: UnitRecord,
) -> Result<ExecutionUnit, ValidationError> {
    Ok(ExecutionUnit {
        id: UnitId(required(event, &format!("{prefix}id"), unit.id)?),
        entry_function_name: unit.entry_function_name.unwrap_or_default(),
    })
}

fn required<T>(event: &'static str, field: &str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::missing(event, field))
}

fn context_id(
    event: &'static str,
    field: &str,
    value: Option<u64>,
) -> Result<ContextId, ValidationError> {
    let raw = required(event, field, value)?;
    ContextId::try_from(raw)
        .map_err(|_| ValidationError::invalid(event, field, format!("{raw} does not fit 32 bits")))
}
