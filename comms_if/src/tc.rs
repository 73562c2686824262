//! # Telecommand module
//!
//! This module provides the telecommands accepted by the arm executable. A
//! telecommand carries a plan, an ordered list of steps produced by the
//! decision service, which the arm executes one step at a time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A plan telecommand, the body of a `POST /robot` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    /// The steps to execute, in order. Never empty once parsed.
    pub plan: Vec<Step>,
}

/// One atomic arm action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub action: Action,

    /// Lateral offset of the target from the arm's base. `None` means the
    /// field was absent.
    ///
    /// Units: centimeters
    #[serde(default)]
    pub x: Option<f64>,

    /// Radial distance of the target from the arm's base. `None` means the
    /// field was absent.
    ///
    /// Units: centimeters
    #[serde(default)]
    pub z: Option<f64>,

    /// Side to place an object on, relative to the arm. Only meaningful for
    /// `place`.
    #[serde(default)]
    pub relation: Option<Relation>,
}

/// Acknowledgement returned by the telecommand server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcAck {
    pub status: AckStatus,
}

/// Error body returned by the telecommand server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcError {
    pub error: String,
}

/// Body of the `GET /status` response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmStatus {
    pub safety: SafetyState,

    /// Number of plans waiting in the queue, excluding the one executing.
    pub queued: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The kind of action a step performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move to the target and dwell to grab.
    Pick,

    /// Move to the target and dwell to release.
    Place,

    /// Move to the target, then present the object to a person.
    Give,
}

/// Side relation used by `place` steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Left,
    Right,
}

/// Safety state of the arm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SafetyState {
    Normal,
    Stopped,
}

/// Status carried by an acknowledgement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// The plan has been queued.
    Accepted,

    /// The arm has been stopped and homed.
    Stopped,

    /// The stop flag has been cleared.
    Normal,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC body must be a JSON object")]
    NotAnObject,

    #[error("TC is missing the \"plan\" field")]
    MissingPlan,

    #[error("\"plan\" must be a list")]
    PlanNotSequence,

    #[error("\"plan\" must contain at least one step")]
    EmptyPlan,

    #[error("Step {index} is invalid: {source}")]
    InvalidStep {
        index: usize,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PlanRequest {
    /// Parse a new plan TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, PlanParseError> {
        let val: Value = serde_json::from_str(json_str).map_err(PlanParseError::InvalidJson)?;

        Self::from_value(val)
    }

    /// Parse a new plan TC from an already decoded JSON value.
    pub fn from_value(val: Value) -> Result<Self, PlanParseError> {
        let mut obj = match val {
            Value::Object(o) => o,
            _ => return Err(PlanParseError::NotAnObject),
        };

        let steps = match obj.remove("plan") {
            Some(Value::Array(a)) => a,
            Some(Value::Null) | None => return Err(PlanParseError::MissingPlan),
            Some(_) => return Err(PlanParseError::PlanNotSequence),
        };

        if steps.is_empty() {
            return Err(PlanParseError::EmptyPlan);
        }

        let plan = steps
            .into_iter()
            .enumerate()
            .map(|(index, s)| {
                serde_json::from_value(s).map_err(|source| PlanParseError::InvalidStep { index, source })
            })
            .collect::<Result<Vec<Step>, _>>()?;

        Ok(PlanRequest { plan })
    }
}

impl Step {
    /// Create a step with an explicit target.
    pub fn new(action: Action, x: f64, z: f64) -> Self {
        Self {
            action,
            x: Some(x),
            z: Some(z),
            relation: None,
        }
    }
}

impl TcAck {
    pub fn new(status: AckStatus) -> Self {
        Self { status }
    }
}

impl TcError {
    pub fn new<S: ToString>(error: S) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}
