//! # Arm Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::arm_ctrl::MAX_TIMING_S;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArmExecParams {
    /// Address the telecommand server listens on
    pub http_bind_addr: String,

    /// Path of the serial port connected to the arm's microcontroller
    pub serial_port: String,

    /// Line speed of the serial port
    pub serial_baud: u32,

    /// Read timeout of the serial port.
    ///
    /// Units: seconds
    pub serial_timeout_s: f64,

    /// Time to wait after opening the port for the microcontroller to boot.
    ///
    /// Units: seconds
    pub serial_open_settle_s: f64,

    /// Maximum time the worker waits on an empty queue before checking in.
    ///
    /// Units: seconds
    pub queue_poll_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExecParamsError {
    #[error("Queue poll period must be in (0, {}] seconds, found {0}", MAX_TIMING_S)]
    InvalidPollPeriod(f64),

    #[error("Serial parameter {0} must be between 0 and {} seconds", MAX_TIMING_S)]
    InvalidSerialTiming(&'static str),

    #[error("The serial baud rate must be non-zero")]
    ZeroBaud,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmExecParams {
    /// Reject parameters which would panic or spin the executable.
    pub fn validate(&self) -> Result<(), ExecParamsError> {
        if !(self.queue_poll_s > 0.0 && self.queue_poll_s <= MAX_TIMING_S) {
            return Err(ExecParamsError::InvalidPollPeriod(self.queue_poll_s));
        }

        if self.serial_baud == 0 {
            return Err(ExecParamsError::ZeroBaud);
        }

        let timings = [
            ("serial_timeout_s", self.serial_timeout_s),
            ("serial_open_settle_s", self.serial_open_settle_s),
        ];
        for (name, value) in timings.iter() {
            if !(*value >= 0.0 && *value <= MAX_TIMING_S) {
                return Err(ExecParamsError::InvalidSerialTiming(*name));
            }
        }

        Ok(())
    }
}

impl Default for ArmExecParams {
    fn default() -> Self {
        Self {
            http_bind_addr: String::from("0.0.0.0:9000"),
            serial_port: String::from("/dev/ttyUSB0"),
            serial_baud: 115_200,
            serial_timeout_s: 0.1,
            serial_open_settle_s: 2.0,
            queue_poll_s: 0.1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_exec_params_valid() {
        assert_eq!(ArmExecParams::default().validate(), Ok(()));
    }

    #[test]
    fn test_poll_period_bounded() {
        let mut p = ArmExecParams::default();

        p.queue_poll_s = 0.0;
        assert_eq!(p.validate(), Err(ExecParamsError::InvalidPollPeriod(0.0)));

        p.queue_poll_s = 1e20;
        assert_eq!(p.validate(), Err(ExecParamsError::InvalidPollPeriod(1e20)));

        p.queue_poll_s = f64::NAN;
        assert!(matches!(
            p.validate(),
            Err(ExecParamsError::InvalidPollPeriod(_))
        ));
    }

    #[test]
    fn test_serial_params_checked() {
        let mut p = ArmExecParams::default();
        p.serial_open_settle_s = -2.0;
        assert_eq!(
            p.validate(),
            Err(ExecParamsError::InvalidSerialTiming("serial_open_settle_s"))
        );

        let mut p = ArmExecParams::default();
        p.serial_baud = 0;
        assert_eq!(p.validate(), Err(ExecParamsError::ZeroBaud));
    }
}
