use crate::components::sprinkler_head::planning::registry::{DwellError, Point};
use crate::devices::hardware::serial::{LineTransport, TransportError};
use crate::messages::control::servo::ServoCommand;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Whether the sprinkler head is currently being driven through a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Reasons a run could not be sent to the head.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Another run holds the head.
    #[error("a run is already in progress")]
    AlreadyRunning,
    /// A target carries a dwell that cannot be sent to the head.
    #[error("point {index} has a dwell the head cannot accept")]
    InvalidDuration {
        index: usize,
        #[source]
        source: DwellError,
    },
    /// The transport failed, the remaining commands were not sent.
    #[error("transport failed after {sent} of {total} commands")]
    Transport {
        sent: usize,
        total: usize,
        #[source]
        source: TransportError,
    },
}

/// Orders targets into servo commands and sends them to the head.
///
/// Only one run may be in flight at a time. The run state is shared
/// between clones, so a clone handed to another task still sees, and
/// is blocked by, a run started from any other clone.
#[derive(Clone, Debug, Default)]
pub struct CommandSequencer {
    state: Arc<Mutex<RunState>>,
}

/// Proof that the holder owns the head for a run. Dropping the ticket
/// returns the sequencer to [`RunState::Idle`], whether the run
/// finished or failed part way.
#[derive(Debug)]
pub struct RunTicket {
    state: Arc<Mutex<RunState>>,
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = RunState::Idle;
    }
}

impl CommandSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn targets into the command stream for one run.
    ///
    /// Targets are visited in ascending `degree_right` so the head only
    /// ever sweeps one way; targets at the same angle keep their
    /// insertion order. Every move is followed by a stop. Fails on the
    /// first target whose dwell is not a number of seconds, before any
    /// command exists to be sent.
    pub fn build(points: &[Point]) -> Result<Vec<ServoCommand>, DispatchError> {
        let mut ordered: Vec<&Point> = points.iter().collect();
        ordered.sort_by(|a, b| a.degree_right.total_cmp(&b.degree_right));

        let mut commands = Vec::with_capacity(ordered.len() * 2);
        for point in ordered {
            let command = ServoCommand::move_to(point.degree_right, &point.duration).map_err(
                |source| DispatchError::InvalidDuration {
                    index: point.index,
                    source,
                },
            )?;
            commands.push(command);
            commands.push(ServoCommand::Stop);
        }
        Ok(commands)
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the head, moving from Idle to Running.
    pub fn try_begin(&self) -> Result<RunTicket, DispatchError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            RunState::Running => Err(DispatchError::AlreadyRunning),
            RunState::Idle => {
                *state = RunState::Running;
                Ok(RunTicket {
                    state: self.state.clone(),
                })
            }
        }
    }

    /// Write `commands` to `transport` one line at a time, in order.
    /// Nothing is read back from the head. The first failed write ends
    /// the run and is returned; the sequencer is Idle again either way.
    /// Returns the number of commands written.
    pub async fn dispatch<T: LineTransport>(
        &self,
        commands: &[ServoCommand],
        transport: &mut T,
    ) -> Result<usize, DispatchError> {
        if commands.is_empty() {
            return Ok(0);
        }
        let _ticket = self.try_begin()?;
        let total = commands.len();
        tracing::info!(total, "dispatching run");

        for (sent, command) in commands.iter().enumerate() {
            let line = command.to_line();
            tracing::debug!(line = %command, "sending");
            if let Err(source) = transport.write_line(&line).await {
                tracing::error!(sent, total, error = %source, "run aborted");
                return Err(DispatchError::Transport {
                    sent,
                    total,
                    source,
                });
            }
        }

        tracing::info!(total, "run complete");
        Ok(total)
    }
}
