//! Arm configuration structures

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::arm::JointDem;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Index of a joint on the arm, 0 is the base.
pub type JointIndex = usize;

/// A configuration of the arm: one angle per joint, in joint index order.
///
/// A pose may cover only the first joints of the arm (IK poses leave the
/// grabber alone), in which case the remaining joints keep their last
/// commanded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    /// Units: degrees
    pub angles_deg: Vec<i32>,
}

/// A spatial goal for the end effector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Lateral offset from the arm's base.
    ///
    /// Units: centimeters
    pub x_cm: f64,

    /// Radial distance from the arm's base.
    ///
    /// Units: centimeters
    pub z_cm: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(angles_deg: Vec<i32>) -> Self {
        Self { angles_deg }
    }

    /// Number of joints this pose covers.
    pub fn len(&self) -> usize {
        self.angles_deg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles_deg.is_empty()
    }

    /// Angle of one joint, if this pose covers it.
    pub fn angle_deg(&self, joint: JointIndex) -> Option<i32> {
        self.angles_deg.get(joint).copied()
    }

    /// The demands needed to reach this pose, base first.
    pub fn joint_dems(&self) -> impl DoubleEndedIterator<Item = JointDem> + '_ {
        self.angles_deg
            .iter()
            .enumerate()
            .map(|(joint, angle_deg)| JointDem::new(joint, *angle_deg))
    }
}

impl Target {
    pub fn new(x_cm: f64, z_cm: f64) -> Self {
        Self { x_cm, z_cm }
    }
}
