use twine_core::transient::SimulationClock;
use uom::si::f64::Time;

use crate::{ConvergenceOutcome, CouplingState};

/// Events emitted by the time loop.
///
/// Each event borrows the clock as it stands right after the transition it
/// reports.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A step was accepted and the clock advanced.
    StepAccepted {
        clock: &'a SimulationClock,
        /// Relative change of the solution over the step.
        relative_change: f64,
    },

    /// A step attempt failed and the clock was rolled back.
    StepRejected {
        clock: &'a SimulationClock,
        failed_dt: Time,
        outcome: ConvergenceOutcome,
    },

    /// The topology changed during the solve and the same step is repeated.
    TopologyRepeat {
        clock: &'a SimulationClock,
        repeat: usize,
    },

    /// A Picard sub-iteration ended, whether or not it converged.
    PicardIteration {
        clock: &'a SimulationClock,
        coupling: &'a CouplingState,
    },
}

impl Event<'_> {
    /// Returns the clock carried by the event.
    #[must_use]
    pub fn clock(&self) -> &SimulationClock {
        match self {
            Self::StepAccepted { clock, .. }
            | Self::StepRejected { clock, .. }
            | Self::TopologyRepeat { clock, .. }
            | Self::PicardIteration { clock, .. } => clock,
        }
    }
}
