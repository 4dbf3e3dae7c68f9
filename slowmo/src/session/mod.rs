//! # Run Sessions
//!
//! A session covers one compile-and-run request: open a message stream from
//! a [`RunEventSource`], feed every message to a [`SessionProcessor`], and
//! stop when the program exits or something fails.
//!
//! - `event_processor`: message routing, counters, teardown
//! - `output`: program output state machine
//! - `highlights`: per-machine source line being run
//! - `replay`: recorded runs from JSON-lines files
//! - `display`: headless rendering of engine updates

pub mod display;
pub mod event_processor;
pub mod highlights;
pub mod output;
pub mod replay;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use log::debug;
use slowmo_common::{CompileRequest, ServerMessage};

pub use event_processor::{SessionProcessor, SessionStep, SessionSummary};
pub use highlights::{Highlight, Highlights};
pub use output::RunOutput;
pub use replay::ReplaySource;

use crate::domain::{SessionError, TransportError};

/// Response stream of one run
pub type MessageStream =
    Pin<Box<dyn Stream<Item = Result<ServerMessage, TransportError>> + Send>>;

/// Anything that can answer a compile-and-run request with a message stream
pub trait RunEventSource {
    /// # Errors
    ///
    /// Fails if the stream cannot be opened.
    fn open(
        &self,
        request: &CompileRequest,
    ) -> impl Future<Output = Result<MessageStream, TransportError>> + Send;
}

/// Drive `processor` with every message of `stream`.
///
/// Waits `step_delay` after each run event so a human can follow along.
///
/// # Errors
///
/// Returns the error that stopped the session; `processor`'s output state
/// records it as well.
pub async fn run_session(
    mut stream: MessageStream,
    processor: &mut SessionProcessor,
    step_delay: Duration,
) -> Result<(), SessionError> {
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                let err = SessionError::from(err);
                processor.fail(&err);
                return Err(err);
            }
        };

        let is_run_event = matches!(message, ServerMessage::RunEvent { .. });
        if processor.process_message(message)? == SessionStep::Finished {
            return Ok(());
        }
        if is_run_event && !step_delay.is_zero() {
            tokio::time::sleep(step_delay).await;
        }
    }

    debug!("Message stream ended after {} messages", processor.message_count);
    if processor.output().is_final() {
        return Ok(());
    }
    let err = SessionError::Protocol("stream ended before the program exited".to_string());
    processor.fail(&err);
    Err(err)
}
