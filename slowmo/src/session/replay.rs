//! Recorded runs replayed from a JSON-lines file
//!
//! One [`ServerMessage`] per line. Blank lines and lines starting with `#`
//! are skipped so recordings can be annotated by hand.

use std::future::Future;
use std::path::{Path, PathBuf};

use futures::stream;
use log::info;
use slowmo_common::{CompileRequest, ServerMessage};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::{MessageStream, RunEventSource};
use crate::domain::TransportError;

#[derive(Debug, Clone)]
pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunEventSource for ReplaySource {
    fn open(
        &self,
        request: &CompileRequest,
    ) -> impl Future<Output = Result<MessageStream, TransportError>> + Send {
        let path = self.path.clone();
        let runtime_version = request.runtime_version.clone();
        async move {
            let file = File::open(&path).await.map_err(|source| TransportError::Open {
                path: path.display().to_string(),
                source,
            })?;
            info!("Replaying recorded run {} ({runtime_version})", path.display());

            let lines = BufReader::new(file).lines();
            let messages: MessageStream =
                Box::pin(stream::unfold((lines, 0), |(lines, line_no)| next_message(lines, line_no)));
            Ok(messages)
        }
    }
}

type RecordingLines = Lines<BufReader<File>>;

async fn next_message(
    mut lines: RecordingLines,
    mut line_no: usize,
) -> Option<(Result<ServerMessage, TransportError>, (RecordingLines, usize))> {
    loop {
        line_no += 1;
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(err) => return Some((Err(err.into()), (lines, line_no))),
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let message = serde_json::from_str(line)
            .map_err(|source| TransportError::Decode { line: line_no, source });
        return Some((message, (lines, line_no)));
    }
}
