//! Parameters structure for ArmCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::NUM_IK_JOINTS;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use util::time::secs_to_duration;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Settle time after lifting to, or returning to, the safe height.
pub const LIFT_SETTLE_S: f64 = 0.2;

/// Dwell at the target of a `pick` step, long enough to close the grabber.
pub const PICK_DWELL_S: f64 = 1.0;

/// Dwell at the target of a `place` step.
pub const PLACE_DWELL_S: f64 = 0.6;

/// Dwell at the target of a `give` step before moving to the hand-off pose.
pub const GIVE_DWELL_S: f64 = 0.6;

/// Time the hand-off pose is held so a person can take the object.
pub const HANDOFF_HOLD_S: f64 = 2.0;

/// Settle time after driving to a named pose.
pub const HOME_SETTLE_S: f64 = 0.4;

/// Delay between consecutive joint commands of one IK move.
pub const INTER_JOINT_DELAY_S: f64 = 0.05;

/// Longest dwell or settle time accepted from a parameter file.
pub const MAX_TIMING_S: f64 = 60.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Arm control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArmParams {
    // ---- GEOMETRY ----
    /// The length of the upper arm, shoulder to elbow.
    ///
    /// Units: centimeters.
    pub shoulder_length_cm: f64,

    /// The length of the forearm, elbow to wrist.
    ///
    /// Units: centimeters.
    pub elbow_length_cm: f64,

    /// Smallest radial distance the solver will aim for.
    ///
    /// Units: centimeters.
    pub min_reach_cm: f64,

    /// Margin kept below full extension of the arm.
    ///
    /// Units: centimeters.
    pub reach_margin_cm: f64,

    // ---- CAPABILITIES ----
    /// Number of joints on the arm, including any joint not driven by IK.
    pub num_joints: usize,

    /// Minimum absolute position of each joint.
    ///
    /// Units: degrees
    pub min_abs_pos_deg: Vec<i32>,

    /// Maximum absolute position of each joint.
    ///
    /// Units: degrees
    pub max_abs_pos_deg: Vec<i32>,

    // ---- POSES ----
    /// Default SAFE position of every joint.
    ///
    /// Units: degrees
    pub home_pose_deg: Vec<i32>,

    /// Position of every joint used to present an object to a person.
    ///
    /// Units: degrees
    pub handoff_pose_deg: Vec<i32>,

    // ---- TARGETS ----
    /// Targets are clamped into `[min_target_z_cm, max_target_z_cm]`.
    ///
    /// Units: centimeters
    pub min_target_z_cm: f64,

    /// Units: centimeters
    pub max_target_z_cm: f64,

    /// Radial distance used when transiting between targets.
    ///
    /// Units: centimeters
    pub safe_height_cm: f64,

    /// Forward target of a `place` step without any explicit target.
    ///
    /// Units: centimeters
    pub place_default_x_cm: f64,

    /// Units: centimeters
    pub place_default_z_cm: f64,

    /// Lateral offset of a `place` step with a left or right relation.
    ///
    /// Units: centimeters
    pub place_side_offset_cm: f64,

    // ---- TIMING ----
    /// Units: seconds
    pub lift_settle_s: f64,

    /// Units: seconds
    pub pick_dwell_s: f64,

    /// Units: seconds
    pub place_dwell_s: f64,

    /// Units: seconds
    pub give_dwell_s: f64,

    /// Units: seconds
    pub handoff_hold_s: f64,

    /// Units: seconds
    pub home_settle_s: f64,

    /// Units: seconds
    pub inter_joint_delay_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a parameter set is rejected at startup.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("The arm needs at least {min} joints, found {found}")]
    TooFewJoints { min: usize, found: usize },

    #[error("Table {name} has {found} entries but the arm has {expected} joints")]
    TableLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Joint {joint} has a minimum ({min}) above its maximum ({max})")]
    InvertedLimit { joint: usize, min: i32, max: i32 },

    #[error("Link lengths must be positive")]
    InvalidLinkLength,

    #[error("The reach interval [{min}, {max}] is empty")]
    InvalidReach { min: f64, max: f64 },

    #[error("The target interval [{min}, {max}] is empty")]
    InvalidTargetRange { min: f64, max: f64 },

    #[error("Timing parameter {0} must be between 0 and {} seconds", MAX_TIMING_S)]
    InvalidTiming(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ArmParams {
    fn default() -> Self {
        Self {
            shoulder_length_cm: 10.5,
            elbow_length_cm: 12.5,
            min_reach_cm: 6.0,
            reach_margin_cm: 0.5,
            num_joints: 5,
            min_abs_pos_deg: vec![-90, -100, 0, -90, 0],
            max_abs_pos_deg: vec![90, 100, 180, 90, 180],
            home_pose_deg: vec![0, 0, 150, -70, 40],
            handoff_pose_deg: vec![0, -45, 60, -15, 40],
            min_target_z_cm: 8.0,
            max_target_z_cm: 38.0,
            safe_height_cm: 20.0,
            place_default_x_cm: 0.0,
            place_default_z_cm: 25.0,
            place_side_offset_cm: 10.0,
            lift_settle_s: LIFT_SETTLE_S,
            pick_dwell_s: PICK_DWELL_S,
            place_dwell_s: PLACE_DWELL_S,
            give_dwell_s: GIVE_DWELL_S,
            handoff_hold_s: HANDOFF_HOLD_S,
            home_settle_s: HOME_SETTLE_S,
            inter_joint_delay_s: INTER_JOINT_DELAY_S,
        }
    }
}

impl ArmParams {
    /// Check the invariants the controller relies on.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.num_joints < NUM_IK_JOINTS {
            return Err(ParamsError::TooFewJoints {
                min: NUM_IK_JOINTS,
                found: self.num_joints,
            });
        }

        let tables = [
            ("min_abs_pos_deg", &self.min_abs_pos_deg),
            ("max_abs_pos_deg", &self.max_abs_pos_deg),
            ("home_pose_deg", &self.home_pose_deg),
            ("handoff_pose_deg", &self.handoff_pose_deg),
        ];
        for (name, table) in tables.iter() {
            if table.len() != self.num_joints {
                return Err(ParamsError::TableLength {
                    name: *name,
                    expected: self.num_joints,
                    found: table.len(),
                });
            }
        }

        for (joint, (min, max)) in self
            .min_abs_pos_deg
            .iter()
            .zip(self.max_abs_pos_deg.iter())
            .enumerate()
        {
            if min > max {
                return Err(ParamsError::InvertedLimit {
                    joint,
                    min: *min,
                    max: *max,
                });
            }
        }

        // NaN fails these comparisons too
        if !(self.shoulder_length_cm > 0.0 && self.elbow_length_cm > 0.0) {
            return Err(ParamsError::InvalidLinkLength);
        }

        if !(self.min_reach_cm > 0.0 && self.min_reach_cm <= self.max_reach_cm()) {
            return Err(ParamsError::InvalidReach {
                min: self.min_reach_cm,
                max: self.max_reach_cm(),
            });
        }

        if !(self.min_target_z_cm <= self.max_target_z_cm) {
            return Err(ParamsError::InvalidTargetRange {
                min: self.min_target_z_cm,
                max: self.max_target_z_cm,
            });
        }

        let timings = [
            ("lift_settle_s", self.lift_settle_s),
            ("pick_dwell_s", self.pick_dwell_s),
            ("place_dwell_s", self.place_dwell_s),
            ("give_dwell_s", self.give_dwell_s),
            ("handoff_hold_s", self.handoff_hold_s),
            ("home_settle_s", self.home_settle_s),
            ("inter_joint_delay_s", self.inter_joint_delay_s),
        ];
        for (name, value) in timings.iter() {
            if !(*value >= 0.0 && *value <= MAX_TIMING_S) {
                return Err(ParamsError::InvalidTiming(*name));
            }
        }

        Ok(())
    }

    /// Furthest radial distance the solver will aim for.
    ///
    /// Units: centimeters
    pub fn max_reach_cm(&self) -> f64 {
        self.shoulder_length_cm + self.elbow_length_cm - self.reach_margin_cm
    }

    /// The same parameters with every dwell and settle time set to zero.
    pub fn without_delays(mut self) -> Self {
        self.lift_settle_s = 0.0;
        self.pick_dwell_s = 0.0;
        self.place_dwell_s = 0.0;
        self.give_dwell_s = 0.0;
        self.handoff_hold_s = 0.0;
        self.home_settle_s = 0.0;
        self.inter_joint_delay_s = 0.0;
        self
    }

    pub(crate) fn delay(seconds: f64) -> Duration {
        secs_to_duration(seconds)
    }
}
