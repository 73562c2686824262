//! Arm inverse kinematics calculations
//!
//! The arm is a two link planar arm on a rotating base with a wrist that
//! counter-rotates to keep the end effector level. Inverse kinematics is
//! described in https://en.wikipedia.org/wiki/Inverse_kinematics, the planar
//! part uses the law of cosines for the elbow and the standard two link
//! decomposition for the shoulder.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

// Internal imports
use super::{ArmParams, Pose};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Inputs the solver cannot make sense of.
///
/// Out of reach targets are not errors, they are clamped.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum IkError {
    #[error("Target must be finite, got x = {x_cm} cm, z = {z_cm} cm")]
    NonFiniteTarget { x_cm: f64, z_cm: f64 },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve the joint angles for a target at radial distance `z_cm` and lateral
/// offset `x_cm`.
///
/// Returns a pose ordered `[base, shoulder, elbow, wrist]` in integer degrees.
/// The target is assumed to lie directly ahead of the shoulder, `z_cm` is the
/// only distance term. Radial distances outside
/// `[min_reach_cm, max_reach_cm()]` are clamped into it.
pub fn solve_angles_deg(params: &ArmParams, z_cm: f64, x_cm: f64) -> Result<Pose, IkError> {
    if !(z_cm.is_finite() && x_cm.is_finite()) {
        return Err(IkError::NonFiniteTarget { x_cm, z_cm });
    }

    let l1 = params.shoulder_length_cm;
    let l2 = params.elbow_length_cm;

    // ---- BASE ----
    // |x| can exceed z for targets far to the side, keep the ratio in the
    // domain of asin.
    let base_rad = if z_cm == 0.0 {
        0.0
    } else {
        clamp(x_cm / z_cm, -1.0, 1.0).asin()
    };

    // ---- PLANAR DISTANCE ----
    let r_cm = clamp(z_cm, params.min_reach_cm, params.max_reach_cm());

    // ---- ELBOW ----
    let cos_elbow = clamp(
        (r_cm.powi(2) - l1.powi(2) - l2.powi(2)) / (2.0 * l1 * l2),
        -1.0,
        1.0,
    );
    let elbow_rad = cos_elbow.acos();

    // ---- SHOULDER ----
    let shoulder_rad = -(l2 * elbow_rad.sin()).atan2(l1 + l2 * elbow_rad.cos());

    // ---- WRIST ----
    let wrist_rad = -(shoulder_rad + elbow_rad);

    trace!(
        "IK z = {:.2} cm (r = {:.2} cm), x = {:.2} cm -> base {:.3}, shoulder {:.3}, elbow {:.3}, wrist {:.3} rad",
        z_cm,
        r_cm,
        x_cm,
        base_rad,
        shoulder_rad,
        elbow_rad,
        wrist_rad
    );

    Ok(Pose::new(vec![
        to_int_deg(base_rad),
        to_int_deg(shoulder_rad),
        to_int_deg(elbow_rad),
        to_int_deg(wrist_rad),
    ]))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp that never panics, unlike `f64::clamp` with an inverted interval.
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

fn to_int_deg(angle_rad: f64) -> i32 {
    angle_rad.to_degrees().round() as i32
}
