use serde::{Deserialize, Serialize};

/// A location on the yard plan. Plan coordinates follow screen
/// convention, `x` grows to the right and `y` grows downwards.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Position {
    /// Horizontal offset from the left of the plan.
    pub x: f64,
    /// Vertical offset from the top of the plan.
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Polar description of a target relative to the sprinkler head.
///
/// The head sweeps a half circle, so every target is described by
/// the angle measured from the right hand edge (`degree_right`) and
/// its complement measured from the left (`degree_left`). The two
/// always add up to 180.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Straight line distance from the head.
    pub distance: f64,
    /// Angle measured from the left edge of the sweep.
    pub degree_left: f64,
    /// Angle measured from the right edge of the sweep. This is what
    /// the servo is driven to.
    pub degree_right: f64,
    /// True when the target is further than the water can reach.
    pub out_of_range: bool,
}

/// Fixed head location and reach used to describe every target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryEngine {
    origin: Position,
    reach_radius: f64,
}

impl GeometryEngine {
    /// * `origin`: location of the sprinkler head on the plan.
    /// * `reach_radius`: furthest distance the head can water.
    pub fn new(origin: Position, reach_radius: f64) -> Self {
        Self {
            origin,
            reach_radius,
        }
    }

    /// Describe `point` relative to this head.
    pub fn compute(&self, point: Position) -> Geometry {
        compute(self.origin, self.reach_radius, point)
    }
}

/// Convert a plan coordinate into a [`Geometry`] relative to `origin`.
///
/// The vertical axis is flipped so that "up" on the plan is positive.
/// Points straight above or below the head are given a 90 degree
/// angle and, like everything with `dx >= 0`, fall in the right half.
/// Targets beyond `reach_radius` are flagged but still described;
/// a target exactly on the radius is in range.
pub fn compute(origin: Position, reach_radius: f64, point: Position) -> Geometry {
    let dx = point.x - origin.x;
    let dy = origin.y - point.y;
    let distance = dx.hypot(dy);

    let angle = if dx != 0.0 {
        (dy.abs() / dx.abs()).atan().to_degrees()
    } else {
        90.0
    };

    let (degree_left, degree_right) = if dx >= 0.0 {
        (180.0 - angle, angle)
    } else {
        (angle, 180.0 - angle)
    };

    Geometry {
        distance,
        degree_left,
        degree_right,
        out_of_range: distance > reach_radius,
    }
}
