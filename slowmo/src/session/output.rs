//! Program output state for one run
//!
//! ```text
//! Requesting ──▶ Running{output} ──▶ Exited{output, runtime_error}
//!     │               │
//!     ├──▶ CompilationError / RequestError
//!     └───────────────┴──▶ VisualizationAborted{output, reason}
//! ```

use serde::Serialize;

use crate::domain::SessionError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutput {
    /// Request sent, nothing received yet
    #[default]
    Requesting,
    Running {
        output: String,
    },
    Exited {
        output: String,
        runtime_error: Option<String>,
    },
    CompilationError {
        message: String,
    },
    RequestError {
        message: String,
    },
    VisualizationAborted {
        output: String,
        reason: String,
    },
}

impl RunOutput {
    /// The program started producing run-level messages
    ///
    /// # Errors
    ///
    /// Fails if the run already reached a final state.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self {
            RunOutput::Requesting => {
                *self = RunOutput::Running { output: String::new() };
                Ok(())
            }
            RunOutput::Running { .. } => Ok(()),
            _ => Err(self.out_of_order("run message")),
        }
    }

    /// Concatenate a chunk of program output
    ///
    /// # Errors
    ///
    /// Fails if the run already reached a final state.
    pub fn append(&mut self, chunk: &str) -> Result<(), SessionError> {
        self.start().map_err(|_| self.out_of_order("runtime output"))?;
        if let RunOutput::Running { output } = self {
            output.push_str(chunk);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the run already reached a final state.
    pub fn exit(&mut self, runtime_error: Option<String>) -> Result<(), SessionError> {
        self.start().map_err(|_| self.out_of_order("runtime result"))?;
        let output = std::mem::take(self).into_output();
        *self = RunOutput::Exited { output, runtime_error };
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless the request is still waiting for its first message.
    pub fn compilation_failed(&mut self, message: String) -> Result<(), SessionError> {
        if *self != RunOutput::Requesting {
            return Err(self.out_of_order("compilation error"));
        }
        *self = RunOutput::CompilationError { message };
        Ok(())
    }

    pub fn request_failed(&mut self, message: String) {
        *self = RunOutput::RequestError { message };
    }

    /// Reconstruction failed; keep what the program printed so far
    pub fn abort(&mut self, reason: String) {
        let output = std::mem::take(self).into_output();
        *self = RunOutput::VisualizationAborted { output, reason };
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, RunOutput::Requesting | RunOutput::Running { .. })
    }

    /// Program output received so far
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            RunOutput::Running { output }
            | RunOutput::Exited { output, .. }
            | RunOutput::VisualizationAborted { output, .. } => output,
            _ => "",
        }
    }

    fn into_output(self) -> String {
        match self {
            RunOutput::Running { output }
            | RunOutput::Exited { output, .. }
            | RunOutput::VisualizationAborted { output, .. } => output,
            _ => String::new(),
        }
    }

    fn state_name(&self) -> &'static str {
        match self {
            RunOutput::Requesting => "requesting",
            RunOutput::Running { .. } => "running",
            RunOutput::Exited { .. } => "exited",
            RunOutput::CompilationError { .. } => "compilation error",
            RunOutput::RequestError { .. } => "request error",
            RunOutput::VisualizationAborted { .. } => "visualization aborted",
        }
    }

    fn out_of_order(&self, what: &str) -> SessionError {
        SessionError::Protocol(format!("{what} received while {}", self.state_name()))
    }
}
