//! # Safety Controller
//!
//! Holds the shared stop flag. Once stopped the arm stays stopped until
//! [`SafetyCtrl::reset`] is called, nothing clears the flag automatically.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::tc::SafetyState;
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::arm_ctrl::{ArmCtrl, ArmCtrlError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Shared stop flag.
///
/// Readers must call [`StopFlag::is_stopped`] every time they need the
/// state, never cache it.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

/// The safety controller, cheap to clone and shared with the telecommand
/// server.
#[derive(Clone)]
pub struct SafetyCtrl {
    flag: StopFlag,

    arm: Arc<ArmCtrl>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SafetyState {
        if self.is_stopped() {
            SafetyState::Stopped
        } else {
            SafetyState::Normal
        }
    }
}

impl SafetyCtrl {
    pub fn new(arm: Arc<ArmCtrl>) -> Self {
        Self {
            flag: StopFlag::new(),
            arm,
        }
    }

    /// Handle to the stop flag, for the worker.
    pub fn flag(&self) -> StopFlag {
        self.flag.clone()
    }

    /// Stop the arm and drive it home.
    ///
    /// The flag is set before homing so the worker abandons its plan at the
    /// next segment boundary even if homing fails. The worker may still
    /// finish the segment it is in.
    pub fn stop(&self) -> Result<(), ArmCtrlError> {
        warn!("Emergency stop requested");
        self.flag.set();

        self.arm.home()
    }

    /// Clear the stop flag so queued plans execute again.
    pub fn reset(&self) -> SafetyState {
        let previous = self.flag.state();
        self.flag.clear();

        info!("Safety state reset (was {:?})", previous);

        previous
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.is_stopped()
    }

    pub fn state(&self) -> SafetyState {
        self.flag.state()
    }
}
