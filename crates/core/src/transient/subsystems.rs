use std::convert::Infallible;

use uom::si::f64::Time;

use super::SimulationClock;

/// The phase of a time step at which coupled subsystems are exchanged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the nonlinear solve.
    Begin,

    /// After a converged nonlinear solve.
    End,
}

impl Phase {
    /// Both phases, in execution order.
    pub const ALL: [Phase; 2] = [Phase::Begin, Phase::End];
}

/// Subsystems coupled to the main problem through data exchange.
///
/// Each phase groups the subsystems that run at that point of the step. The
/// time loop snapshots both phases at the start of every step and restores
/// them before each Picard sub-iteration after the first and after a rejected
/// step, so side effects never accumulate across attempts.
///
/// Implementations must make [`snapshot`](Self::snapshot) and
/// [`restore`](Self::restore) atomic: after `restore(phase)` the subsystems are
/// exactly as they were at the matching `snapshot(phase)`.
pub trait CoupledSubsystems {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the subsystems of `phase` for the step described by `clock`.
    ///
    /// `allow_single_iteration` is `true` when no Picard sub-iteration is
    /// configured, so a subsystem may treat this call as its only chance to
    /// converge. Returns whether every subsystem converged.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if a subsystem fails outright.
    fn exchange(
        &mut self,
        phase: Phase,
        clock: &SimulationClock,
        allow_single_iteration: bool,
    ) -> Result<bool, Self::Error>;

    /// Captures the state of the subsystems of `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the state cannot be captured.
    fn snapshot(&mut self, phase: Phase) -> Result<(), Self::Error>;

    /// Restores the state captured by the last [`snapshot`](Self::snapshot).
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the state cannot be restored.
    fn restore(&mut self, phase: Phase) -> Result<(), Self::Error>;

    /// Returns the largest step every subsystem of `phase` can accept, or
    /// `None` if the phase places no limit.
    fn minimum_acceptable_step(&self, phase: Phase) -> Option<Time>;

    /// Completes a step that was solved with Picard sub-iteration.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the subsystems cannot finish the step.
    fn finish_step(&mut self, _phase: Phase) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Advances the step counters of the subsystems after an accepted step.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the counters cannot be advanced.
    fn advance_step(&mut self, _phase: Phase) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// No coupled subsystems: every exchange converges and no step limit applies.
impl CoupledSubsystems for () {
    type Error = Infallible;

    fn exchange(&mut self, _: Phase, _: &SimulationClock, _: bool) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn snapshot(&mut self, _: Phase) -> Result<(), Self::Error> {
        Ok(())
    }

    fn restore(&mut self, _: Phase) -> Result<(), Self::Error> {
        Ok(())
    }

    fn minimum_acceptable_step(&self, _: Phase) -> Option<Time> {
        None
    }
}
