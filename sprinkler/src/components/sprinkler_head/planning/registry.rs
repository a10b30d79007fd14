use super::geometry::{GeometryEngine, Position};
use crate::utils::time::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Class of target placed on the plan. Each class has its own dwell
/// time so larger trees can be watered for longer.
#[derive(
    EnumString,
    Display,
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
)]
pub enum Category {
    #[default]
    #[strum(serialize = "tree_1")]
    #[serde(rename = "tree_1")]
    Tree1,
    #[strum(serialize = "tree_2")]
    #[serde(rename = "tree_2")]
    Tree2,
    #[strum(serialize = "tree_3")]
    #[serde(rename = "tree_3")]
    Tree3,
}

/// A dwell duration could not be read as seconds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dwell {0:?} is not a non-negative number of seconds")]
pub struct DwellError(pub String);

/// Dwell time as the operator entered it, less surrounding
/// whitespace.
///
/// The text is what the head and the export see. It is interpreted as
/// seconds when a run is built or summarised, and a dwell that does not
/// read as a number stops both.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Dwell(String);

impl Dwell {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// Text as entered.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the dwell as a number of seconds. Anything that is not
    /// a finite, non-negative number is rejected.
    pub fn seconds(&self) -> Result<f64, DwellError> {
        match self.0.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
            _ => Err(DwellError(self.0.clone())),
        }
    }
}

impl fmt::Display for Dwell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Dwell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<&str> for Dwell {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One placed target.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    /// Position in the run, starting at 0 in insertion order.
    pub index: usize,
    /// Distance from the sprinkler head.
    pub distance: f64,
    /// Angle measured from the left edge of the sweep.
    pub degree_left: f64,
    /// Angle measured from the right edge of the sweep.
    pub degree_right: f64,
    /// Where the target was placed on the plan. Not exported.
    pub position: Position,
    pub category: Category,
    /// Dwell taken from the category at the time the point was added.
    pub duration: Dwell,
    /// Beyond the reach of the head. Not exported.
    pub out_of_range: bool,
    /// When the point was added.
    pub mark_time: Timestamp,
    /// When the run this point belongs to started.
    pub run_time: Timestamp,
}

/// Ordered set of targets for the active run.
///
/// The registry is the only owner of the points; everything
/// downstream works from [`PointRegistry::snapshot`]. Each `add`
/// pushes onto an edit stack and `undo_last` pops it, so the indices
/// are always `0..len` in insertion order.
#[derive(Debug, Clone)]
pub struct PointRegistry {
    engine: GeometryEngine,
    edits: Vec<Point>,
    next_index: usize,
    run_start: Option<Timestamp>,
}

impl PointRegistry {
    pub fn new(engine: GeometryEngine) -> Self {
        Self {
            engine,
            edits: Vec::new(),
            next_index: 0,
            run_start: None,
        }
    }

    /// Start a new run at `now`, dropping every point.
    pub fn reset(&mut self, now: Timestamp) {
        self.edits.clear();
        self.next_index = 0;
        self.run_start = Some(now);
    }

    /// Place a target. The first point of a session that was never
    /// reset starts the run itself.
    ///
    /// * `position`: plan coordinate of the target.
    /// * `category`: class of target.
    /// * `duration`: dwell configured for the category right now.
    /// * `now`: time of the click.
    pub fn add(
        &mut self,
        position: Position,
        category: Category,
        duration: Dwell,
        now: Timestamp,
    ) -> Point {
        let geometry = self.engine.compute(position);
        let run_time = *self.run_start.get_or_insert(now);

        let point = Point {
            index: self.next_index,
            distance: geometry.distance,
            degree_left: geometry.degree_left,
            degree_right: geometry.degree_right,
            position,
            category,
            duration,
            out_of_range: geometry.out_of_range,
            mark_time: now,
            run_time,
        };
        self.next_index += 1;
        self.edits.push(point.clone());
        point
    }

    /// Remove the most recently added point. Does nothing on an empty
    /// registry. The run start time is kept.
    pub fn undo_last(&mut self) -> Option<Point> {
        let point = self.edits.pop()?;
        self.next_index -= 1;
        Some(point)
    }

    /// Points in insertion order.
    pub fn snapshot(&self) -> &[Point] {
        &self.edits
    }

    /// Index the next added point will receive.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Start time of the active run, if one has begun.
    pub fn run_start(&self) -> Option<Timestamp> {
        self.run_start
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
