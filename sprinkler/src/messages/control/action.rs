use crate::components::sprinkler_head::planning::registry::Category;
use serde::{Deserialize, Serialize};

/// Action requested by the operator. One JSON object per line, tagged
/// by `action`, for example `{"action": "add", "x": 410, "y": 220}`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionMessage {
    /// Place a target of the selected category at a plan coordinate.
    Add { x: f64, y: f64 },
    /// Remove the most recently placed target.
    Undo,
    /// Drive the head through every target.
    Run,
    /// Clear the targets and start a new run.
    Reset,
    /// Export the run to the configured CSV file.
    Save,
    /// Choose the category for the next targets.
    Select { category: Category },
    /// Change the dwell used for new targets of a category. The text is
    /// kept as given and checked when the run is summarised.
    SetDuration { category: Category, duration: String },
    /// Print the session table.
    Show,
}

impl ActionMessage {
    /// Whether the action changes the targets or drives the head. These
    /// are refused while a run is in flight.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ActionMessage::Add { .. }
                | ActionMessage::Undo
                | ActionMessage::Run
                | ActionMessage::Reset
        )
    }
}
