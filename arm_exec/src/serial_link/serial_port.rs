//! [`LinkPort`] implementation for ports opened with the `serialport` crate

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serialport::SerialPort;
use std::io::{self, Read, Write};

use super::LinkPort;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinkPort for Box<dyn SerialPort> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.write_all(frame)?;
        self.flush()
    }

    fn read_pending(&mut self) -> io::Result<Vec<u8>> {
        let available = self.bytes_to_read().map_err(io::Error::from)? as usize;

        let mut buf = vec![0u8; available];
        if available > 0 {
            let n = self.read(&mut buf)?;
            buf.truncate(n);
        }

        Ok(buf)
    }
}
