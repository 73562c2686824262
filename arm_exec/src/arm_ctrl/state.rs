//! Implementations for the ArmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::{
    eqpt::arm::JointDem,
    tc::{Action, Relation, Step},
};
use log::{debug, info};
use std::{sync::Arc, thread};

// Internal
use super::{
    solve_angles_deg, ArmCtrlError, ArmParams, JointIndex, JointLimits, ParamsError, Pose, Target,
};
use crate::{safety::StopFlag, serial_link::SerialLink};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose controller.
///
/// Composes the geometry solver, the joint limiter and the serial link to
/// move the arm. All methods take `&self` so the worker and the emergency
/// stop path can share one controller, the link serialises their commands.
pub struct ArmCtrl {
    params: ArmParams,

    limits: JointLimits,

    link: Arc<SerialLink>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the execution of a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every motion segment of the step was performed.
    Completed,

    /// A stop was observed between segments, the rest of the step was
    /// abandoned.
    Aborted,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Create a new controller, rejecting invalid parameters.
    pub fn new(params: ArmParams, link: Arc<SerialLink>) -> Result<Self, ParamsError> {
        params.validate()?;

        Ok(Self {
            limits: JointLimits::from_params(&params),
            params,
            link,
        })
    }

    pub fn params(&self) -> &ArmParams {
        &self.params
    }

    /// Home pose of the arm.
    pub fn home_pose(&self) -> Pose {
        Pose::new(self.params.home_pose_deg.clone())
    }

    /// Hand-off pose of the arm.
    pub fn handoff_pose(&self) -> Pose {
        Pose::new(self.params.handoff_pose_deg.clone())
    }

    /// Work out where a step should go.
    ///
    /// `place` steps may name a side instead of a target, and a `place`
    /// without any target goes to a fixed spot in front of the arm. Missing
    /// coordinates otherwise default to straight ahead at the safe height.
    pub fn resolve_target(&self, step: &Step) -> Target {
        let p = &self.params;

        let target = match (step.action, step.relation, step.x, step.z) {
            (Action::Place, Some(Relation::Left), _, _) => {
                Target::new(-p.place_side_offset_cm, p.place_default_z_cm)
            }
            (Action::Place, Some(Relation::Right), _, _) => {
                Target::new(p.place_side_offset_cm, p.place_default_z_cm)
            }
            (Action::Place, None, None, None) => {
                Target::new(p.place_default_x_cm, p.place_default_z_cm)
            }
            (_, _, x, z) => Target::new(x.unwrap_or(0.0), z.unwrap_or(p.safe_height_cm)),
        };

        self.clamp_target(target)
    }

    /// Clamp the radial distance of a target into the reachable interval.
    pub fn clamp_target(&self, target: Target) -> Target {
        Target {
            x_cm: target.x_cm,
            z_cm: target
                .z_cm
                .max(self.params.min_target_z_cm)
                .min(self.params.max_target_z_cm),
        }
    }

    /// Move the IK joints to a target.
    ///
    /// If `safe` is set the arm goes to the safe height at the target's
    /// lateral offset instead of the target itself. The grabber is never
    /// touched. Returns the pose that was actually commanded.
    pub fn move_to(&self, target: Target, safe: bool) -> Result<Pose, ArmCtrlError> {
        let target = if safe {
            Target::new(target.x_cm, self.params.safe_height_cm)
        } else {
            target
        };
        let target = self.clamp_target(target);

        let pose = solve_angles_deg(&self.params, target.z_cm, target.x_cm)?;

        debug!(
            "Moving to x = {:.1} cm, z = {:.1} cm{}",
            target.x_cm,
            target.z_cm,
            if safe { " (safe height)" } else { "" }
        );

        let delay = ArmParams::delay(self.params.inter_joint_delay_s);
        let mut sent = Vec::with_capacity(pose.len());
        for dem in pose.joint_dems() {
            sent.push(self.send_joint(dem.joint, dem.angle_deg)?);
            thread::sleep(delay);
        }

        Ok(Pose::new(sent))
    }

    /// Drive every joint covered by `pose`, grabber first and base last, then
    /// wait for the arm to settle.
    pub fn move_to_pose(&self, pose: &Pose) -> Result<(), ArmCtrlError> {
        for dem in pose.joint_dems().rev() {
            self.send_joint(dem.joint, dem.angle_deg)?;
        }

        thread::sleep(ArmParams::delay(self.params.home_settle_s));

        Ok(())
    }

    /// Return the arm to its resting configuration.
    pub fn home(&self) -> Result<(), ArmCtrlError> {
        info!("Homing arm");
        self.move_to_pose(&self.home_pose())
    }

    /// Present a held object to a person.
    pub fn hand_off(&self) -> Result<(), ArmCtrlError> {
        info!("Moving to hand-off pose");
        self.move_to_pose(&self.handoff_pose())
    }

    /// Execute one plan step.
    ///
    /// The arm lifts to the safe height above the target, descends, dwells
    /// for the action and lifts again. `give` additionally presents the
    /// object in the hand-off pose before lifting. The stop flag is checked
    /// between every segment, a segment that has started always completes.
    ///
    /// Homing after an abort is left to the caller.
    pub fn exec_step(&self, step: &Step, stop: &StopFlag) -> Result<StepOutcome, ArmCtrlError> {
        let target = self.resolve_target(step);
        let p = &self.params;

        info!(
            "Executing {:?} at x = {:.1} cm, z = {:.1} cm",
            step.action, target.x_cm, target.z_cm
        );

        // ---- LIFT ----
        self.move_to(target, true)?;
        thread::sleep(ArmParams::delay(p.lift_settle_s));

        if stop.is_stopped() {
            return Ok(StepOutcome::Aborted);
        }

        // ---- DESCEND ----
        self.move_to(target, false)?;
        thread::sleep(ArmParams::delay(match step.action {
            Action::Pick => p.pick_dwell_s,
            Action::Place => p.place_dwell_s,
            Action::Give => p.give_dwell_s,
        }));

        // ---- HAND-OFF ----
        if step.action == Action::Give {
            if stop.is_stopped() {
                return Ok(StepOutcome::Aborted);
            }

            self.hand_off()?;
            thread::sleep(ArmParams::delay(p.handoff_hold_s));
        }

        if stop.is_stopped() {
            return Ok(StepOutcome::Aborted);
        }

        // ---- LIFT ----
        self.move_to(target, true)?;
        thread::sleep(ArmParams::delay(p.lift_settle_s));

        Ok(StepOutcome::Completed)
    }

    /// Clamp and transmit a single joint angle, returning what was sent.
    fn send_joint(&self, joint: JointIndex, angle_deg: i32) -> Result<i32, ArmCtrlError> {
        let limited = self
            .limits
            .clamp(joint, angle_deg)
            .ok_or(ArmCtrlError::UnknownJoint(joint))?;

        if limited != angle_deg {
            debug!(
                "Joint {} limited from {} to {} deg",
                joint, angle_deg, limited
            );
        }

        self.link.send(JointDem::new(joint, limited))?;

        Ok(limited)
    }
}
