//! # Serial Link Module
//!
//! This module owns the exclusive connection to the arm's microcontroller.
//! Every joint command goes through [`SerialLink::send`], which holds a
//! single lock while a frame is written so that commands from the worker and
//! from the emergency stop path never interleave mid-frame.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`LinkPort`] implementation for real serial ports.
mod serial_port;

/// [`LinkPort`] implementation which only logs, used for dry runs.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::JointDem;
use log::{debug, info, warn};
use std::{io, sync::Mutex, thread};

use crate::params::ArmExecParams;
use util::time::secs_to_duration;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API over the byte streams the link can write to.
pub trait LinkPort: Send {
    /// Write a complete frame, blocking until the write has finished.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Read any bytes the microcontroller has sent without being asked.
    ///
    /// Ports which can't receive return nothing.
    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The single connection to the arm.
///
/// Constructed once at startup and shared by reference. The port is closed
/// when the link is dropped.
pub struct SerialLink {
    /// Name of the port, for logging
    name: String,

    port: Mutex<Box<dyn LinkPort>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur on the [`SerialLink`]
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("Could not open serial port {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    #[error("Could not write {frame:?} to the arm: {source}")]
    Write { frame: String, source: io::Error },

    #[error("The serial link lock was poisoned by a panicking thread")]
    Poisoned,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SerialLink {
    /// Open the serial port named in the parameters.
    ///
    /// The microcontroller resets when the port opens, so this blocks for the
    /// configured settle time before draining anything it printed on boot.
    pub fn open(params: &ArmExecParams) -> Result<Self, LinkError> {
        let port = serialport::new(params.serial_port.as_str(), params.serial_baud)
            .timeout(secs_to_duration(params.serial_timeout_s))
            .open()
            .map_err(|source| LinkError::Open {
                port: params.serial_port.clone(),
                source,
            })?;

        info!(
            "Opened serial port {} at {} baud, waiting {:.1} s for the arm to boot",
            params.serial_port, params.serial_baud, params.serial_open_settle_s
        );
        thread::sleep(secs_to_duration(params.serial_open_settle_s));

        let link = Self::from_port(params.serial_port.clone(), port);
        link.drain_incoming();

        Ok(link)
    }

    /// Build a link over an already open port.
    pub fn from_port<P: LinkPort + 'static>(name: String, port: P) -> Self {
        Self {
            name,
            port: Mutex::new(Box::new(port)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frame and write a single joint command.
    ///
    /// Write failures are returned to the caller and never retried, a broken
    /// link needs someone to look at the hardware.
    pub fn send(&self, dem: JointDem) -> Result<(), LinkError> {
        let frame = dem.to_frame();

        let mut port = self.port.lock().map_err(|_| LinkError::Poisoned)?;

        port.write_frame(frame.as_bytes())
            .map_err(|source| LinkError::Write {
                frame: dem.to_string(),
                source,
            })?;

        debug!("[SERIAL] {}", dem);

        Ok(())
    }

    /// Log any text the microcontroller sent us.
    ///
    /// These bytes are informational only, nothing depends on them.
    pub fn drain_incoming(&self) {
        let bytes = match self.port.lock() {
            Ok(mut port) => port.read_pending(),
            Err(_) => return,
        };

        match bytes {
            Ok(b) if !b.is_empty() => {
                for line in String::from_utf8_lossy(&b).lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        debug!("[ARM] {}", line);
                    }
                }
            }
            Ok(_) => (),
            Err(e) => warn!("Could not read from {}: {}", self.name, e),
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        info!("Closing serial link {}", self.name);
    }
}
