//! # Arm Equipment Commands
//!
//! The arm's microcontroller accepts one human readable line per joint
//! command, of the form `J <joint_index> <angle_degrees>\n`. It never
//! acknowledges completion.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Leading token of every joint command frame.
const FRAME_TAG: &str = "J";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demand for a single joint of the arm.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointDem {
    /// Index of the joint, 0 is the base.
    pub joint: usize,

    /// Demanded angle of the joint.
    ///
    /// Units: degrees
    pub angle_deg: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised when decoding a joint command frame.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FrameParseError {
    #[error("Frame is not newline terminated")]
    MissingTerminator,

    #[error("Expected frame tag \"J\", found {0:?}")]
    InvalidTag(String),

    #[error("Expected 3 fields in the frame, found {0}")]
    WrongFieldCount(usize),

    #[error("Invalid number in frame: {0:?}")]
    InvalidNumber(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointDem {
    pub fn new(joint: usize, angle_deg: i32) -> Self {
        Self { joint, angle_deg }
    }

    /// Build the newline terminated line sent over the serial link.
    pub fn to_frame(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for JointDem {
    /// Displays the frame without its terminator, which is what gets logged.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", FRAME_TAG, self.joint, self.angle_deg)
    }
}

impl FromStr for JointDem {
    type Err = FrameParseError;

    /// Parse a full frame, including the newline terminator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_suffix('\n')
            .ok_or(FrameParseError::MissingTerminator)?;

        let fields: Vec<&str> = body.split(' ').collect();
        if fields.len() != 3 {
            return Err(FrameParseError::WrongFieldCount(fields.len()));
        }
        if fields[0] != FRAME_TAG {
            return Err(FrameParseError::InvalidTag(fields[0].to_string()));
        }

        let joint = fields[1]
            .parse()
            .map_err(|_| FrameParseError::InvalidNumber(fields[1].to_string()))?;
        let angle_deg = fields[2]
            .parse()
            .map_err(|_| FrameParseError::InvalidNumber(fields[2].to_string()))?;

        Ok(Self { joint, angle_deg })
    }
}
