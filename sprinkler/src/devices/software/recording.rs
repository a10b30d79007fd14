use crate::devices::hardware::serial::{LineTransport, TransportError};
use std::io;

/// Transport that keeps every line it is given. Used in place of the
/// serial link for dry runs and in tests, where it can also be told to
/// fail part way through a run the way an unplugged cable would.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    lines: Vec<String>,
    fail_after: Option<usize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` lines, then fail every write after that.
    pub fn failing_after(count: usize) -> Self {
        Self {
            lines: Vec::new(),
            fail_after: Some(count),
        }
    }

    /// Lines written so far, newline included.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl LineTransport for RecordingTransport {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.fail_after.is_some_and(|limit| self.lines.len() >= limit) {
            return Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "recording transport disconnected",
            )));
        }
        self.lines.push(line.to_string());
        Ok(())
    }
}
