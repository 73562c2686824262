//! Arm control module
//!
//! Converts spatial targets into joint demands and drives the arm through
//! the choreography of each plan step. The geometry solver and joint limiter
//! are pure; only [`ArmCtrl`] touches the serial link.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod arm_config;
mod inverse_kinematics;
mod limits;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use arm_config::*;
pub use inverse_kinematics::*;
pub use limits::*;
pub use params::*;
pub use state::*;

use crate::serial_link::LinkError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of joints driven by the inverse kinematics: base, shoulder,
/// elbow and wrist. Any further joint (the grabber) is only moved by named
/// poses.
pub const NUM_IK_JOINTS: usize = 4;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ArmCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("Inverse kinematics failed: {0}")]
    Ik(#[from] IkError),

    #[error("No limit is configured for joint {0}")]
    UnknownJoint(JointIndex),

    #[error("Could not command the arm: {0}")]
    Link(#[from] LinkError),
}
