//! Headless rendering of engine updates
//!
//! Text form, one line per thread entry:
//!
//! ```text
//! #3 execute M2
//!   M0 [--] scheduling
//!   M2 [P1 next=G5 runq=G8,G9] exec=G1 runtime.main
//!   -- [P0]
//!   parked: G2 runtime.forcegchelper (force gc (idle))
//! ```

use std::fmt::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::engine::{EngineUpdate, Snapshot};
use crate::events::Progress;
use crate::model::{ExecutionUnit, Model, ProcessingContext, Thread};

use super::SessionSummary;

const PLACEHOLDER: &str = "--";

/// Renders updates for a terminal or a JSON consumer
#[derive(Debug, Clone)]
pub struct UpdateRenderer {
    format: OutputFormat,
    /// Program source, one entry per line, for progress lines
    source: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
enum UpdateRecord<'a> {
    Committed(&'a Snapshot),
    Progress(&'a Progress),
    Reset,
}

impl UpdateRenderer {
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format, source: None }
    }

    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.lines().map(str::to_string).collect());
        self
    }

    /// # Errors
    ///
    /// Fails only if JSON serialization fails.
    pub fn render(&self, update: &EngineUpdate) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(&match update {
                EngineUpdate::Committed(snapshot) => UpdateRecord::Committed(snapshot),
                EngineUpdate::Progress(progress) => UpdateRecord::Progress(progress),
                EngineUpdate::Reset => UpdateRecord::Reset,
            }),
            OutputFormat::Text => Ok(match update {
                EngineUpdate::Committed(snapshot) => render_snapshot(snapshot),
                EngineUpdate::Progress(progress) => self.render_progress(progress),
                EngineUpdate::Reset => "-- reset --".to_string(),
            }),
        }
    }

    fn render_progress(&self, progress: &Progress) -> String {
        let mut line = format!("{} {} line {}", progress.machine, progress.unit, progress.line);
        let text = self.source.as_ref().and_then(|source| {
            usize::try_from(progress.line).ok().and_then(|n| source.get(n.checked_sub(1)?))
        });
        if let Some(text) = text {
            let _ = write!(line, ": {}", text.trim());
        }
        line
    }
}

/// Print one update to stdout
pub fn display_update(renderer: &UpdateRenderer, update: &EngineUpdate) {
    match renderer.render(update) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => log::warn!("Failed to render update: {err}"),
    }
}

/// Display session statistics
pub fn display_summary(summary: &SessionSummary) {
    let events = summary
        .events
        .iter()
        .map(|(kind, count)| format!("{kind}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    eprintln!(
        "{} messages, {} commits, {} new units, {} unrecognized, {} skipped updates ({events})",
        summary.messages,
        summary.commits,
        summary.new_contexts,
        summary.unrecognized,
        summary.dropped_updates,
    );
}

#[must_use]
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let machines = snapshot
        .changes
        .machines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let mut out = format!("#{}", snapshot.sequence);
    if !machines.is_empty() {
        let _ = write!(out, " {machines}");
    }
    out.push('\n');
    out.push_str(&render_model(&snapshot.model));
    out
}

#[must_use]
pub fn render_model(model: &Model) -> String {
    let mut out = String::new();
    for thread in &model.threads {
        let _ = writeln!(out, "  {}", render_thread(thread));
    }
    let parked = model
        .parked
        .iter()
        .map(|parked| format!("{} ({})", render_unit(&parked.unit), parked.wait_reason))
        .collect::<Vec<_>>();
    if parked.is_empty() {
        out.push_str("  parked: -");
    } else {
        let _ = write!(out, "  parked: {}", parked.join(", "));
    }
    out
}

#[must_use]
pub fn render_thread(thread: &Thread) -> String {
    let machine = thread.machine_id.map_or_else(|| PLACEHOLDER.to_string(), |m| m.to_string());
    let context = thread.bound_context.as_ref().map_or_else(|| PLACEHOLDER.to_string(), render_context);
    let mut line = format!("{machine} [{context}]");
    if let Some(unit) = &thread.executing {
        let _ = write!(line, " exec={}", render_unit(unit));
    } else if thread.is_scheduling {
        line.push_str(" scheduling");
    }
    line
}

fn render_context(context: &ProcessingContext) -> String {
    let mut out = context.id.to_string();
    if let Some(next) = &context.run_next {
        let _ = write!(out, " next={}", next.id);
    }
    if !context.run_queue.is_empty() {
        let queue = context.run_queue.iter().map(|unit| unit.id.to_string()).collect::<Vec<_>>();
        let _ = write!(out, " runq={}", queue.join(","));
    }
    out
}

fn render_unit(unit: &ExecutionUnit) -> String {
    if unit.entry_function_name.is_empty() {
        unit.id.to_string()
    } else {
        format!("{} {}", unit.id, unit.entry_function_name)
    }
}
