use twine_core::transient::SimulationClock;

use crate::RecoverableState;

/// Indicates why the time loop stopped.
///
/// Variants are listed in the priority order in which stop conditions are
/// checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// An observer returned [`Action::StopEarly`](crate::Action::StopEarly).
    StoppedByObserver,

    /// The problem requested termination.
    TerminationRequested,

    /// Successive solutions stopped changing.
    SteadyState,

    /// The configured number of steps was taken.
    MaxSteps,

    /// The end time was reached.
    EndTime,

    /// A solve failed and the run was configured to abort on failure.
    SolveFailed,
}

/// The result of a transient run.
#[derive(Debug, Clone)]
pub struct Solution {
    /// How the run terminated.
    pub status: Status,

    /// The clock when the run stopped.
    pub clock: SimulationClock,

    /// Number of accepted steps in this run.
    pub accepted_steps: usize,

    /// Number of rejected step attempts in this run.
    pub rejected_steps: usize,

    /// Number of step repeats caused by topology changes in this run.
    pub topology_repeats: usize,

    /// Loop state at termination, suitable for resuming.
    pub state: RecoverableState,
}
