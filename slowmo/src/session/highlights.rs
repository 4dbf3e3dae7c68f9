//! Source lines currently being run, per machine thread
//!
//! Presentation-only: progress events never touch the scheduler model.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{MachineId, UnitId};
use crate::events::Progress;

/// The line a machine thread's current unit reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub unit: UnitId,
    pub line: u32,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    by_machine: BTreeMap<MachineId, Highlight>,
}

impl Highlights {
    pub fn record(&mut self, progress: &Progress) {
        self.by_machine.insert(
            progress.machine,
            Highlight { unit: progress.unit, line: progress.line, file: progress.file.clone() },
        );
    }

    /// The machine entered the scheduler loop; its unit is no longer running
    pub fn clear_machine(&mut self, machine: MachineId) -> Option<Highlight> {
        self.by_machine.remove(&machine)
    }

    pub fn clear(&mut self) {
        self.by_machine.clear();
    }

    #[must_use]
    pub fn get(&self, machine: MachineId) -> Option<&Highlight> {
        self.by_machine.get(&machine)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &Highlight)> {
        self.by_machine.iter().map(|(machine, highlight)| (*machine, highlight))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_machine.is_empty()
    }

    /// Units running each highlighted line; several machines can share one
    #[must_use]
    pub fn by_line(&self) -> BTreeMap<u32, Vec<UnitId>> {
        let mut lines: BTreeMap<u32, Vec<UnitId>> = BTreeMap::new();
        for highlight in self.by_machine.values() {
            lines.entry(highlight.line).or_default().push(highlight.unit);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(machine: u64, unit: u64, line: u32) -> Progress {
        Progress {
            machine: MachineId(machine),
            unit: UnitId(unit),
            line,
            file: Some("main.go".to_string()),
            function: Some("main.main".to_string()),
        }
    }

    #[test]
    fn test_latest_progress_wins() {
        let mut highlights = Highlights::default();
        highlights.record(&progress(0, 1, 10));
        highlights.record(&progress(0, 1, 11));

        assert_eq!(highlights.get(MachineId(0)).map(|h| h.line), Some(11));
    }

    #[test]
    fn test_schedule_clears_only_that_machine() {
        let mut highlights = Highlights::default();
        highlights.record(&progress(0, 1, 10));
        highlights.record(&progress(2, 7, 20));

        assert!(highlights.clear_machine(MachineId(0)).is_some());
        assert!(highlights.clear_machine(MachineId(0)).is_none());
        assert_eq!(highlights.iter().map(|(m, _)| m).collect::<Vec<_>>(), vec![MachineId(2)]);
    }

    #[test]
    fn test_shared_line_lists_every_unit() {
        let mut highlights = Highlights::default();
        highlights.record(&progress(0, 8, 14));
        highlights.record(&progress(2, 9, 14));

        assert_eq!(highlights.by_line().get(&14), Some(&vec![UnitId(8), UnitId(9)]));
    }
}
