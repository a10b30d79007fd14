/// Devices are the atomic units that can be combined together
/// into components. Their core responsibilities do not change
/// based on location, name etc.
pub mod hardware {
    /// Line oriented serial link to the servo controller.
    pub mod serial;
}

/// Devices that stand in for hardware, used in tests and dry runs.
pub mod software {
    /// Transport that records every line instead of sending it.
    pub mod recording;
}
