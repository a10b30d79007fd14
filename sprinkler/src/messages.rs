/// Standardise how messages are sent into and out of
/// the current control system. Provide test suite to
/// ensure interfaces are respected.
pub mod control {
    /// Action messages come from the operator, one JSON
    /// object per line.
    pub mod action;
    /// Servo messages go out over the serial link to the
    /// sprinkler head.
    pub mod servo;
}
