use crate::components::sprinkler_head::planning::registry::{Dwell, DwellError};
use std::fmt;

/// Largest angle the head can rotate to.
pub const MAX_ANGLE: u8 = 180;

/// Command understood by the servo controller on the sprinkler head.
///
/// On the wire every command is one ASCII line, `<angle>,<dwell>\n`.
/// A move holds the head at `angle` for `dwell` seconds; the stop
/// command is the literal line `0,0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServoCommand {
    /// Rotate to `angle` degrees and hold for `dwell`.
    Move { angle: u8, dwell: Dwell },
    /// Return to rest.
    Stop,
}

impl ServoCommand {
    /// Build a move command from a sweep angle. The angle is rounded
    /// half to even and kept within `0..=180`. The dwell must read as
    /// seconds, so nothing but a number ever lands in the dwell field.
    pub fn move_to(degree_right: f64, dwell: &Dwell) -> Result<Self, DwellError> {
        dwell.seconds()?;
        let angle = degree_right.round_ties_even().clamp(0.0, f64::from(MAX_ANGLE)) as u8;
        Ok(Self::Move {
            angle,
            dwell: dwell.clone(),
        })
    }

    /// Text sent over the wire, newline included.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ServoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServoCommand::Move { angle, dwell } => write!(f, "{angle},{dwell}"),
            ServoCommand::Stop => f.write_str("0,0"),
        }
    }
}
