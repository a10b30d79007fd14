/// Components that drive the rotating sprinkler head.
pub mod sprinkler_head {
    /// Components that turn placed targets into head positions.
    pub mod planning {
        /// Pure conversion of plane coordinates into head angles.
        pub mod geometry;
        /// Ordered, undoable record of the targets in the current run.
        pub mod registry;
    }
    /// Components that provide actuation capability.
    pub mod actuating {
        /// Ordering of targets into servo commands and their dispatch.
        pub mod sequencer;
    }
    /// Components that summarise a run.
    pub mod reporting {
        /// Totals, exported records and the session table.
        pub mod session;
    }
    /// Maps user actions onto the registry, sequencer and report.
    pub mod controller;
}

/// Helpful prelude when working with components.
pub mod prelude {
    pub use crate::components::sprinkler_head::actuating::sequencer::*;
    pub use crate::components::sprinkler_head::controller::*;
    pub use crate::components::sprinkler_head::planning::geometry::*;
    pub use crate::components::sprinkler_head::planning::registry::*;
    pub use crate::components::sprinkler_head::reporting::session::*;
}
