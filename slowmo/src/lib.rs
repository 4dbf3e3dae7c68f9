//! # slowmo - Scheduler State Reconstruction for Go Programs
//!
//! slowmo follows a Go program's run in slow motion. An instrumented runtime
//! reports every scheduling decision as a probe event; slowmo rebuilds, event
//! by event, which machine thread (M) owns which processing context (P), what
//! each context's run queue holds, which goroutine (G) each thread executes,
//! and which goroutines are parked.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Compile-and-Run Service                        │
//! │        (instrumented runtime, probe events over a stream)       │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ ServerMessage stream (live or recorded)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     slowmo (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Session    │──▶│    Events    │──▶│    Engine    │         │
//! │  │ (processor)  │   │ (validation) │   │ (reconcile + │         │
//! │  └──────────────┘   └──────────────┘   │   commit)    │         │
//! │         │                              └──────┬───────┘         │
//! │         ▼                                     │ Snapshot         │
//! │  ┌──────────────┐                             ▼                 │
//! │  │ Output state │                     ┌──────────────┐          │
//! │  │ + highlights │                     │ Subscribers  │          │
//! │  └──────────────┘                     │  (display)   │          │
//! │                                       └──────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`engine`]: the reconstruction engine
//!   - `rebind`: thread ↔ context handoff
//!   - `transitions`: one decision per event kind
//!   - `commit`: staged, all-or-nothing application of a decision
//!   - `invariants`: checks run before every commit
//! - [`events`]: validation of wire events into closed event types
//! - [`model`]: threads, contexts, units, parked registry
//! - [`session`]: stream driving, output state, replay source, display
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: id newtypes and error types
//!
//! ## Consistency
//!
//! Each committed snapshot satisfies:
//!
//! - every context is bound to at most one thread entry
//! - every machine id appears at most once
//! - every unit is in exactly one place
//! - no thread entry lacks both a machine and a context
//!
//! A decision that would break any of these is rejected as a whole and the
//! run is aborted; observers never see a half-applied decision.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Print every committed state of a recorded run
//! slowmo run.jsonl
//!
//! # Slow motion, with the program source for line highlights
//! slowmo run.jsonl --source main.go --step-delay-ms 500
//! ```
//!
//! ## Key Concepts
//!
//! - **M**: OS thread executing Go code
//! - **P**: scheduling context an M must hold to run goroutines
//! - **G**: goroutine
//! - **runnext**: single-slot priority entry of a P, ahead of its run queue
//! - **Park / ready**: a G blocks on a condition / becomes runnable again

pub mod cli;
pub mod domain;
pub mod engine;
pub mod events;
pub mod model;
pub mod session;
