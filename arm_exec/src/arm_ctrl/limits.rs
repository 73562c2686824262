//! Joint limiter
//!
//! Every angle passes through here before it reaches the serial link, so the
//! link never transmits a mechanically unsafe command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{ArmParams, JointIndex};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Closed interval of safe angles for one joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointLimit {
    /// Units: degrees
    pub min_deg: i32,

    /// Units: degrees
    pub max_deg: i32,
}

/// The static limit table of the arm, indexed by joint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointLimits {
    limits: Vec<JointLimit>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl JointLimit {
    /// Saturate an angle into this limit.
    pub fn clamp(&self, angle_deg: i32) -> i32 {
        angle_deg.max(self.min_deg).min(self.max_deg)
    }

    pub fn contains(&self, angle_deg: i32) -> bool {
        self.min_deg <= angle_deg && angle_deg <= self.max_deg
    }
}

impl JointLimits {
    /// Build the table from validated parameters.
    pub fn from_params(params: &ArmParams) -> Self {
        Self {
            limits: params
                .min_abs_pos_deg
                .iter()
                .zip(params.max_abs_pos_deg.iter())
                .map(|(min_deg, max_deg)| JointLimit {
                    min_deg: *min_deg,
                    max_deg: *max_deg,
                })
                .collect(),
        }
    }

    /// Saturate `angle_deg` into the limit of `joint`.
    ///
    /// Returns `None` only if the table has no entry for `joint`.
    pub fn clamp(&self, joint: JointIndex, angle_deg: i32) -> Option<i32> {
        self.limits.get(joint).map(|l| l.clamp(angle_deg))
    }

    pub fn get(&self, joint: JointIndex) -> Option<&JointLimit> {
        self.limits.get(joint)
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}
