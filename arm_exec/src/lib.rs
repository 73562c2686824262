//! # Arm library.
//!
//! Everything the arm executable is built from, exposed so the integration
//! tests can drive the controller without hardware.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm control module - converts spatial targets into joint demands and performs plan steps
pub mod arm_ctrl;

/// Parameters for the arm executable
pub mod params;

/// Safety controller - the shared emergency stop flag
pub mod safety;

/// Serial link - the exclusive connection to the arm's microcontroller
pub mod serial_link;

/// Task queue and the worker executing queued plans
pub mod task_queue;

/// Telecommand server - accepts plans and stops over HTTP
pub mod tc_server;
