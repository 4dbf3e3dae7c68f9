//! # slowmo - Main Entry Point
//!
//! Replays a recorded compile-and-run stream through the reconstruction engine
//! and prints every committed scheduler state, as text or JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use slowmo::cli::Args;
use slowmo::domain::SessionError;
use slowmo::session::display::{display_summary, display_update, UpdateRenderer};
use slowmo::session::{run_session, ReplaySource, RunEventSource, RunOutput, SessionProcessor};
use slowmo_common::CompileRequest;

// Exit codes (usage errors exit with 2 from clap)
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_COMPILATION: i32 = 3;
const EXIT_ABORTED: i32 = 4;

fn main() {
    env_logger::init();
    let args = Args::parse();
    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

// Every session error that leaves the output `VisualizationAborted` exits with 4
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SessionError>() {
        Some(SessionError::Compilation(_)) => EXIT_COMPILATION,
        Some(
            SessionError::Reconstruction(_) | SessionError::Protocol(_) | SessionError::Aborted,
        ) => EXIT_ABORTED,
        _ => EXIT_ERROR,
    }
}

#[tokio::main]
async fn run(args: Args) -> Result<()> {
    let quiet = args.quiet;

    let source = args
        .source
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read program source: {}", path.display()))
        })
        .transpose()?;
    let request = CompileRequest::new(source.clone().unwrap_or_default())
        .with_runtime_version(args.runtime_version.as_str());

    if !quiet {
        println!("slowmo v{}", env!("CARGO_PKG_VERSION"));
        println!("recording: {}", args.recording.display());
        println!("runtime: {}", request.runtime_version);
    }

    let replay = ReplaySource::new(&args.recording);
    let stream = replay.open(&request).await.map_err(SessionError::from)?;

    let mut processor = SessionProcessor::new();
    let capacity = usize::try_from(args.channel_capacity).unwrap_or(usize::MAX);
    let updates = processor.subscribe(capacity);

    let mut renderer = UpdateRenderer::new(args.format);
    if let Some(source) = &source {
        renderer = renderer.with_source(source);
    }
    // Exits once the processor (and its engine) is dropped
    let display_handle = std::thread::spawn(move || {
        for update in updates {
            display_update(&renderer, &update);
        }
    });

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = tokio::select! {
        result = run_session(stream, &mut processor, args.step_delay()) => result,
        _ = &mut ctrl_c => Err(SessionError::Aborted),
    };
    if matches!(outcome, Err(SessionError::Aborted)) {
        processor.fail(&SessionError::Aborted);
    }

    let summary = processor.finish();
    display_handle.join().ok();
    info!("Final state: {:?}", summary.output);

    if !quiet {
        let output = summary.output.output();
        if !output.is_empty() {
            eprintln!("\nprogram output:\n{}", output.trim_end());
        }
        if let RunOutput::Exited { runtime_error: Some(error), .. } = &summary.output {
            eprintln!("program exited with error: {error}");
        }
        display_summary(&summary);
    }

    outcome?;
    Ok(())
}
