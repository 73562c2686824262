//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software: the
//! plan telecommands accepted over the network and the joint command frames
//! written to the arm's microcontroller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Command definitions for equipment (the arm's actuators)
pub mod eqpt;
