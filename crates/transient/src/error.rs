use std::error::Error as StdError;

use twine_core::transient::TimeIncrementError;

use crate::{CheckpointError, ConfigError};

/// Errors that abort a transient run.
///
/// Non-convergence is not an error: it rejects the step and the loop retries
/// with a smaller one. These variants cover conditions no retry can fix.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid initial step: {0}")]
    InvalidInitialStep(#[from] TimeIncrementError),

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("step of {dt} s failed and cannot be cut below dt_min")]
    MinimumStepReached { dt: f64 },

    #[error("{count} consecutive steps were rejected")]
    TooManyRejections { count: usize },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("problem error: {0}")]
    Problem(#[source] Box<dyn StdError + Send + Sync>),

    #[error("integrator error: {0}")]
    Integrator(#[source] Box<dyn StdError + Send + Sync>),

    #[error("subsystem error: {0}")]
    Subsystems(#[source] Box<dyn StdError + Send + Sync>),

    #[error("topology error: {0}")]
    Topology(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn problem<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Problem(Box::new(err))
    }

    pub(crate) fn integrator<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Integrator(Box::new(err))
    }

    pub(crate) fn subsystems<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Subsystems(Box::new(err))
    }

    pub(crate) fn topology<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Topology(Box::new(err))
    }
}
