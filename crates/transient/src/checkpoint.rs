use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use twine_core::transient::{ClockError, SimulationClock};
use uom::si::{f64::Time, time::second};

use crate::{CouplingState, SteadyStateTracker, TopologyRepeats, Transition};

/// Version of the [`RecoverableState`] layout.
pub const STATE_VERSION: u32 = 1;

/// Everything the time loop needs to resume a run.
///
/// The record is captured between step transitions, never during a solve.
/// Every field is required when deserializing, so a record written by a
/// different layout fails to load instead of silently taking defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecoverableState {
    pub version: u32,
    pub clock: ClockRecord,
    pub step_sizer: StepSizerRecord,
    pub coupling: CouplingState,
    pub topology: TopologyRepeats,
    pub steady_state: SteadyStateTracker,
    pub control: ControlRecord,
}

/// The clock, with times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockRecord {
    pub time: f64,
    pub time_old: f64,
    pub step: usize,
    pub dt: f64,
    pub dt_old: f64,
}

/// Step-size bookkeeping, with times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSizerRecord {
    pub unconstrained_dt: f64,
    pub at_sync_point: bool,
    #[serde(deserialize_with = "Option::deserialize")]
    pub target_time: Option<f64>,
    /// A failed step still waiting for its smaller retry.
    #[serde(deserialize_with = "Option::deserialize")]
    pub rejected_dt: Option<f64>,
}

/// Flags describing where the loop is between transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlRecord {
    pub first: bool,
    pub last_solve_converged: bool,
    pub subsystems_converged: bool,
    pub last_transition: Transition,
}

/// Errors that can occur when saving or loading a [`RecoverableState`].
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed")]
    Io(#[from] io::Error),

    #[error("malformed checkpoint: {0}")]
    Format(#[from] serde_json::Error),

    #[error("checkpoint version {found} does not match expected {expected}")]
    Version { found: u32, expected: u32 },
}

/// A destination for recoverable state.
///
/// The time loop calls [`save`](Self::save) after every completed step
/// attempt.
pub trait Checkpoint {
    /// Persists the state.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckpointError`] if the state cannot be stored.
    fn save(&mut self, state: &RecoverableState) -> Result<(), CheckpointError>;
}

/// Discards every state.
impl Checkpoint for () {
    fn save(&mut self, _state: &RecoverableState) -> Result<(), CheckpointError> {
        Ok(())
    }
}

/// Keeps every saved state in memory.
impl Checkpoint for Vec<RecoverableState> {
    fn save(&mut self, state: &RecoverableState) -> Result<(), CheckpointError> {
        self.push(state.clone());
        Ok(())
    }
}

/// Stores the latest state as a JSON file.
///
/// Each save writes a sibling temporary file and renames it over the target,
/// so a crash mid-save leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpoint {
    path: PathBuf,
}

impl JsonFileCheckpoint {
    /// Creates a checkpoint that writes to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the checkpoint path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the most recently saved state.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckpointError`] if the file is missing, malformed, or
    /// written with a different layout version.
    pub fn load(&self) -> Result<RecoverableState, CheckpointError> {
        let contents = fs::read_to_string(&self.path)?;
        RecoverableState::from_json(&contents)
    }
}

impl Checkpoint for JsonFileCheckpoint {
    fn save(&mut self, state: &RecoverableState) -> Result<(), CheckpointError> {
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, state.to_json()?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl RecoverableState {
    /// Serializes the state to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Format`] if a value cannot be represented.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes and version-checks a state.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Format`] for malformed or incomplete input,
    /// or [`CheckpointError::Version`] for a layout mismatch.
    pub fn from_json(input: &str) -> Result<Self, CheckpointError> {
        let state: Self = serde_json::from_str(input)?;
        state.check_version()?;
        Ok(state)
    }

    /// Checks that the state was written with the current layout.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Version`] on mismatch.
    pub fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version == STATE_VERSION {
            Ok(())
        } else {
            Err(CheckpointError::Version {
                found: self.version,
                expected: STATE_VERSION,
            })
        }
    }
}

impl ClockRecord {
    pub(crate) fn capture(clock: &SimulationClock) -> Self {
        Self {
            time: clock.time().get::<second>(),
            time_old: clock.time_old().get::<second>(),
            step: clock.step(),
            dt: clock.dt().get::<second>(),
            dt_old: clock.dt_old().get::<second>(),
        }
    }

    pub(crate) fn to_clock(self) -> Result<SimulationClock, ClockError> {
        let s = Time::new::<second>;
        SimulationClock::from_parts(
            s(self.time),
            s(self.time_old),
            self.step,
            s(self.dt),
            s(self.dt_old),
        )
    }
}
