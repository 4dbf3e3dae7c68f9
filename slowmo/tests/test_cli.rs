use std::io::Write;
use std::process::{Command, Output};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn slowmo(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_slowmo")).args(args).output().expect("failed to run slowmo")
}

#[test]
fn test_text_replay_prints_final_state() {
    let output = slowmo(&[&fixture("wait_group.jsonl"), "--quiet"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).expect("Invalid UTF-8");
    assert!(stdout.contains("#15 M0,M1\n  M0 [P0] scheduling\n  M1 [P1] exec=G1 runtime.main\n  parked: -"));
    assert!(stdout.contains("  parked: G1 runtime.main (sync.WaitGroup.Wait)"));
}

#[test]
fn test_json_lines_parse() {
    let output = slowmo(&[&fixture("wait_group.jsonl"), "--quiet", "--format", "json"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).expect("Invalid UTF-8");
    let updates: Vec<serde_json::Value> =
        stdout.lines().map(|line| serde_json::from_str(line).expect("Invalid JSON")).collect();
    assert_eq!(updates.iter().filter(|u| u["update"] == "committed").count(), 15);
    assert_eq!(updates.last().map(|u| u["update"].clone()), Some("reset".into()));
}

#[test]
fn test_source_lines_shown_with_progress() {
    let output = slowmo(&[
        &fixture("wait_group.jsonl"),
        "--quiet",
        "--source",
        &fixture("main.go"),
    ]);

    let stdout = String::from_utf8(output.stdout).expect("Invalid UTF-8");
    assert!(stdout.contains("M0 G1 line 9: var wg sync.WaitGroup"));
}

#[test]
fn test_exit_codes() {
    assert_eq!(slowmo(&[&fixture("compile_error.jsonl"), "--quiet"]).status.code(), Some(3));
    assert_eq!(slowmo(&[&fixture("unparked_ready.jsonl"), "--quiet"]).status.code(), Some(4));
    assert_eq!(slowmo(&["/nonexistent/run.jsonl", "--quiet"]).status.code(), Some(1));
    assert_eq!(slowmo(&[]).status.code(), Some(2));
}

#[test]
fn test_malformed_recording_reports_line() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "{{\"type\":\"concurrency_width\",\"count\":1}}").unwrap();
    writeln!(file, "{{\"type\":\"run_event\",").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let output = slowmo(&[&path, "--quiet"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("Invalid UTF-8");
    assert!(stderr.contains("line 2"), "stderr: {stderr}");
}

#[test]
fn test_truncated_recording_is_aborted() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "{{\"type\":\"concurrency_width\",\"count\":1}}").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let output = slowmo(&[&path, "--quiet"]);

    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8(output.stderr).expect("Invalid UTF-8");
    assert!(stderr.contains("stream ended before the program exited"), "stderr: {stderr}");
}
