//! Lazy log streaming.
//!
//! A [`LogStream`] is a forward-only, non-restartable sequence of text
//! lines, backed either by a child process (`docker compose logs`,
//! `tail -f`) or by an in-memory buffer. Cancellation kills the backing
//! child and is reported as [`LogEnd::Cancelled`], distinct from normal
//! end-of-stream. Backing children are spawned with kill-on-drop so that
//! abandoning a stream never leaks a subprocess.

use crate::error::{CorralError, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};

/// How a log stream terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEnd {
    /// The source produced all its lines and closed.
    Eof,
    /// Consumption was cancelled by the operator.
    Cancelled,
}

enum Source {
    Child { child: Child, lines: Lines<BufReader<ChildStdout>> },
    Buffered(std::vec::IntoIter<String>),
    Finished,
}

/// A lazy, forward-only sequence of log lines.
pub struct LogStream {
    source: Source,
}

impl LogStream {
    /// Stream lines from a spawned child's stdout.
    ///
    /// The child must have been spawned with piped stdout and
    /// `kill_on_drop(true)`.
    pub fn from_child(mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CorralError::Internal("log child has no stdout pipe".to_string()))?;
        let lines = BufReader::new(stdout).lines();
        Ok(Self { source: Source::Child { child, lines } })
    }

    /// Stream a fixed set of lines (non-follow mode, tests).
    #[must_use]
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { source: Source::Buffered(lines.into_iter()) }
    }

    /// Next line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        match &mut self.source {
            Source::Child { lines, .. } => {
                let line = lines
                    .next_line()
                    .await
                    .map_err(|e| CorralError::Internal(format!("log read failed: {}", e)))?;
                if line.is_none() {
                    self.source = Source::Finished;
                }
                Ok(line)
            }
            Source::Buffered(iter) => {
                let line = iter.next();
                if line.is_none() {
                    self.source = Source::Finished;
                }
                Ok(line)
            }
            Source::Finished => Ok(None),
        }
    }

    /// Cancel consumption: kills the backing child, closes the stream,
    /// and reports the distinct cancellation signal.
    pub fn cancel(&mut self) -> LogEnd {
        if let Source::Child { child, .. } = &mut self.source {
            let _ = child.start_kill();
        }
        self.source = Source::Finished;
        LogEnd::Cancelled
    }
}
