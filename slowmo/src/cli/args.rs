//! CLI argument definitions

use clap::{Parser, ValueEnum};
use slowmo_common::DEFAULT_RUNTIME_VERSION;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "slowmo",
    about = "Replay a program run and reconstruct its scheduler state step by step",
    after_help = "\
EXAMPLES:
    slowmo run.jsonl                             Print every committed scheduler state
    slowmo run.jsonl --step-delay-ms 500         Slow motion, one event every 500ms
    slowmo run.jsonl --format json > states.json Snapshots as JSON lines"
)]
pub struct Args {
    /// Recorded compile-and-run stream (JSON lines, one message per line)
    #[arg(value_name = "RECORDING")]
    pub recording: PathBuf,

    /// Program source the run was produced from (shown with highlighted lines)
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,

    /// Runtime version the program is compiled against
    #[arg(long, default_value = DEFAULT_RUNTIME_VERSION)]
    pub runtime_version: String,

    /// Pause after each scheduler event, in milliseconds (0 = no pause)
    #[arg(long, default_value = "0")]
    pub step_delay_ms: u64,

    /// How committed states are printed
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Updates buffered for the display before intermediate states are skipped
    #[arg(long, default_value = "1024", value_parser = clap::value_parser!(u64).range(1..))]
    pub channel_capacity: u64,
}

impl Args {
    #[must_use]
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per thread
    Text,
    /// One JSON object per update
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["slowmo", "run.jsonl"]).unwrap();

        assert_eq!(args.recording, PathBuf::from("run.jsonl"));
        assert_eq!(args.runtime_version, "go1.24");
        assert_eq!(args.step_delay(), Duration::ZERO);
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.channel_capacity, 1024);
        assert!(!args.quiet);
    }

    #[test]
    fn test_json_with_delay() {
        let args = Args::try_parse_from([
            "slowmo",
            "run.jsonl",
            "--format",
            "json",
            "--step-delay-ms",
            "250",
            "--source",
            "main.go",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.step_delay(), Duration::from_millis(250));
        assert_eq!(args.source, Some(PathBuf::from("main.go")));
    }

    #[test]
    fn test_recording_required_and_capacity_positive() {
        assert!(Args::try_parse_from(["slowmo"]).is_err());
        assert!(Args::try_parse_from(["slowmo", "run.jsonl", "--channel-capacity", "0"]).is_err());
    }
}
