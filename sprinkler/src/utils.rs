/// Subscriber setup for `tracing`.
pub mod logging;
/// Second resolution timestamps with a fixed text format.
pub mod time;
