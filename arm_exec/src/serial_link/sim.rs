//! Simulated port for running the executable without an arm attached.

use std::io;

use super::LinkPort;

/// A port which accepts every frame and never sends anything back.
///
/// The link already logs each frame it sends, which is all a dry run needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimPort;

impl LinkPort for SimPort {
    fn write_frame(&mut self, _frame: &[u8]) -> io::Result<()> {
        Ok(())
    }
}
