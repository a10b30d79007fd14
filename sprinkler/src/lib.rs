/**
The sprinkler control system turns target points placed on a 2D plan of the
yard into rotation commands for a servo driven sprinkler head. The crate keeps
the same split used across the machine software: devices are atomic units that
talk to hardware, components group devices with the state needed to perform a
function, and messages describe what crosses the process boundary.
*/

/// Components in the system group devices and session state into
/// a logical unit that performs some function, such as placing
/// targets and driving the sprinkler head through them.
pub mod components;
/// Devices that are an atomic unit, and can be composed
/// with other devices into components to perform some function.
pub mod devices;
/// Message structure for communication into and out of the
/// control system, user actions in and servo commands out.
pub mod messages;
/// Development utilities for timestamps, logging and tests.
pub mod utils;
